// Data channel acquisition: active and passive providers, the shared passive
// port pool, and the PORT/EPRT/PASV/EPSV command surface.

pub mod pasv;
pub mod port;
pub mod port_pool;
pub mod provider;

pub use port_pool::PassivePortPool;
pub use provider::{AddressFamily, ChannelDescriptor, ChannelError, DataChannelProvider};
