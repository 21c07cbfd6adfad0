//! `terramesh` binary: runs the routing daemon, or talks to one running
//! elsewhere for administration. Mirrors the `Opt`/`Command` split and
//! startup sequence of `garage/main.rs`, minus the RPC network key (there's
//! no inter-node authentication in scope here) and minus tokio (every
//! long-lived thing here is a plain OS thread).

#[macro_use]
extern crate tracing;

mod admin;
mod cli;
mod identity;
mod server;

use std::path::PathBuf;

use structopt::StructOpt;

use cli::Command;

#[derive(StructOpt, Debug)]
#[structopt(name = "terramesh", about = "Routing tier for a geo-referenced multispectral imagery fabric")]
struct Opt {
	/// Address of a running node to contact for admin commands, in the
	/// format host:port. Defaults to 127.0.0.1 on the configured
	/// listen_port.
	#[structopt(short = "h", long = "host", env = "TERRAMESH_HOST")]
	host: Option<String>,

	/// Path to configuration file
	#[structopt(
		short = "c",
		long = "config",
		env = "TERRAMESH_CONFIG_FILE",
		default_value = "/etc/terramesh.toml"
	)]
	config_file: PathBuf,

	#[structopt(subcommand)]
	cmd: Command,
}

fn main() {
	let panic_version = env!("CARGO_PKG_VERSION");
	std::panic::set_hook(Box::new(move |panic_info| {
		eprintln!("======== PANIC (internal terramesh error) ========");
		eprintln!("{}", panic_info);
		eprintln!();
		eprintln!("terramesh version: {}", panic_version);
		eprintln!();
		eprintln!("backtrace:");
		eprintln!("{:?}", backtrace::Backtrace::new());
		std::process::abort();
	}));

	let opt = Opt::from_args();

	if std::env::var("RUST_LOG").is_err() {
		let default_log = match &opt.cmd {
			Command::Server => "terramesh=info",
			_ => "terramesh=warn",
		};
		std::env::set_var("RUST_LOG", default_log);
	}
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();

	std::process::exit(run(opt));
}

/// Exit codes per spec.md §6: 0 clean shutdown, 1 startup failure, 2
/// invalid configuration. Only `Command::Server` can produce 2 — admin
/// subcommands either succeed or fail outright, same as `garage`'s CLI
/// exiting 1 uniformly on any `cli_command` error.
fn run(opt: Opt) -> i32 {
	match opt.cmd {
		Command::Server => {
			let config = match server::load_config(&opt.config_file) {
				Ok(config) => config,
				Err(e) => {
					eprintln!("Error: {}", e);
					return 2;
				}
			};
			match server::run_server(opt.config_file, config) {
				Ok(()) => 0,
				Err(e) => {
					eprintln!("Error: {}", e);
					1
				}
			}
		}
		other => match run_admin(opt.host, opt.config_file, other) {
			Ok(()) => 0,
			Err(e) => {
				eprintln!("Error: {}", e);
				1
			}
		},
	}
}

fn run_admin(host: Option<String>, config_file: PathBuf, cmd: Command) -> Result<(), terramesh_util::error::Error> {
	let host = cli::resolve_host(host, &config_file)?;
	match cmd {
		Command::Server => unreachable!(),
		Command::Status => cli::cmd_status(&host),
		Command::Node(cli::NodeOperation::Add(add_opt)) => cli::cmd_node_add(&host, add_opt),
		Command::Node(cli::NodeOperation::Remove(remove_opt)) => cli::cmd_node_remove(&host, remove_opt),
		Command::Storage(cli::StorageOperation::Add(add_opt)) => cli::cmd_storage_add(&host, add_opt),
		Command::Storage(cli::StorageOperation::Remove(remove_opt)) => cli::cmd_storage_remove(&host, remove_opt),
	}
}
