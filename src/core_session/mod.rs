// Per-connection command plumbing: the reader/executor task pair that keeps
// the control connection responsive while a transfer occupies the executor.

pub mod control;
