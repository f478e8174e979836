mod commands;
mod interrupt;
mod terminal;

use std::sync::Arc;

use anyhow::Context as _;
use camfleet_core::network::http::HttpTransport;
use commands::{CommandLine, Commands, Context, apps, check, deploy, install, scan};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.quiet || commands.json);
    print::banner(commands.no_banner || commands.json || commands.quiet);

    let cfg = Arc::new(commands.config());
    let transport =
        HttpTransport::new(cfg.timeouts.reach).context("failed to build HTTP client")?;
    let ctx = Context {
        cfg,
        credential: commands.credential()?,
        transport: Arc::new(transport),
    };
    let quiet = commands.quiet || commands.json;

    let outcome = match commands.command {
        Commands::Scan { target, mdns, save } => {
            print::section("sweeping for devices", quiet);
            scan::scan(target, scan::ScanOptions { mdns, save }, &ctx).await
        }
        Commands::Check { address, port } => {
            print::section("checking device", quiet);
            check::check(address, port, &ctx).await
        }
        Commands::Apps { address, port } => {
            print::section("installed applications", quiet);
            apps::list(address, port, &ctx).await
        }
        Commands::Control {
            address,
            package,
            action,
            port,
        } => {
            print::section("application control", quiet);
            apps::control(address, port, &package, action, &ctx).await
        }
        Commands::Install {
            address,
            file,
            port,
            package,
        } => {
            print::section("installing package", quiet);
            install::install(address, port, &file, package, &ctx).await
        }
        Commands::Deploy {
            target,
            file,
            concurrency,
            config,
            strict_config,
            all,
            port,
            from_inventory,
            package,
        } => {
            print::section("batch deployment", quiet);
            let options = deploy::DeployOptions {
                concurrency,
                config,
                strict_config,
                all,
                port,
                from_inventory,
                package,
            };
            deploy::deploy(target, &file, options, &ctx).await
        }
    };

    print::footer(quiet);
    outcome
}
