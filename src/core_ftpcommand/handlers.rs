use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_network::{pasv, port};
use crate::core_transfer::orchestrator::{self, StoreKind};
use crate::core_transfer::TransferSlot;
use crate::helpers::ControlWriter;
use crate::server::ServerContext;
use crate::session::Session;

/// What the executor does after a command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
}

/// Routes one parsed command to its handler.
pub async fn dispatch(
    command: FtpCommand,
    writer: &ControlWriter,
    ctx: &ServerContext,
    session: &mut Session,
    slot: &TransferSlot,
    arg: String,
) -> Result<CommandOutcome, std::io::Error> {
    use crate::core_ftpcommand as cmd;

    match command {
        FtpCommand::USER => cmd::user::handle_user_command(writer, ctx, session, arg).await?,
        FtpCommand::PASS => cmd::pass::handle_pass_command(writer, ctx, session, arg).await?,
        FtpCommand::QUIT => {
            cmd::quit::handle_quit_command(writer).await?;
            return Ok(CommandOutcome::Quit);
        }
        FtpCommand::NOOP => cmd::noop::handle_noop_command(writer).await?,
        FtpCommand::SYST => cmd::syst::handle_syst_command(writer).await?,
        FtpCommand::FEAT => cmd::feat::handle_feat_command(writer).await?,
        FtpCommand::PWD => cmd::pwd::handle_pwd_command(writer, session).await?,
        FtpCommand::CWD => cmd::cwd::handle_cwd_command(writer, session, arg).await?,
        FtpCommand::CDUP => cmd::cdup::handle_cdup_command(writer, session).await?,
        FtpCommand::MKD => cmd::mkd::handle_mkd_command(writer, ctx, session, arg).await?,
        FtpCommand::RMD => cmd::rmd::handle_rmd_command(writer, ctx, session, arg).await?,
        FtpCommand::DELE => cmd::dele::handle_dele_command(writer, ctx, session, arg).await?,
        FtpCommand::RNFR => cmd::rnfr::handle_rnfr_command(writer, ctx, session, arg).await?,
        FtpCommand::RNTO => cmd::rnto::handle_rnto_command(writer, ctx, session, arg).await?,
        FtpCommand::SIZE => cmd::size::handle_size_command(writer, session, arg).await?,
        FtpCommand::MDTM => cmd::mdtm::handle_mdtm_command(writer, session, arg).await?,
        FtpCommand::LIST => cmd::list::handle_list_command(writer, ctx, session, arg).await?,
        FtpCommand::TYPE => cmd::type_::handle_type_command(writer, session, arg).await?,
        FtpCommand::MODE => cmd::mode::handle_mode_command(writer, session, arg).await?,
        FtpCommand::STRU => cmd::stru::handle_stru_command(writer, session, arg).await?,
        FtpCommand::REST => cmd::rest::handle_rest_command(writer, session, arg).await?,
        FtpCommand::ABOR => cmd::abor::handle_abor_command(writer, session).await?,
        FtpCommand::STAT => cmd::stat::handle_stat_command(writer, session).await?,
        FtpCommand::PORT => port::handle_port_command(writer, ctx, session, arg).await?,
        FtpCommand::EPRT => port::handle_eprt_command(writer, ctx, session, arg).await?,
        FtpCommand::PASV => pasv::handle_pasv_command(writer, ctx, session).await?,
        FtpCommand::EPSV => pasv::handle_epsv_command(writer, ctx, session, arg).await?,
        FtpCommand::RETR => orchestrator::retrieve(writer, ctx, session, slot, arg).await?,
        FtpCommand::STOR => {
            orchestrator::store(writer, ctx, session, slot, arg, StoreKind::Create).await?
        }
        FtpCommand::APPE => {
            orchestrator::store(writer, ctx, session, slot, arg, StoreKind::Append).await?
        }
        FtpCommand::STOU => {
            orchestrator::store(writer, ctx, session, slot, arg, StoreKind::Unique).await?
        }
    }
    Ok(CommandOutcome::Continue)
}
