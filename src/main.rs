// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use std::env;
use std::sync::Arc;
use tenant_host::config::{load_config, HandlerSpec, HostConfig};
use tenant_host::observability::init_tracing;
use tenant_host::transport::CgiTransport;
use tenant_host::Host;

const USAGE: &str = "Usage: tenant-host [-c <config.yaml>] [-m <module[:entry]>] [-V]

Serves the single CGI request described by the environment and stdin.

  -c <file>    host configuration (YAML)
  -m <spec>    handler override, e.g. site.wasm:application
  -V           print the version and exit";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<String>,
    handler: Option<String>,
    version: bool,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-c" => {
                let path = iter.next().context("-c needs a config file")?;
                options.config = Some(path.clone());
            }
            "-m" => {
                let spec = iter.next().context("-m needs a module[:entry] value")?;
                if HandlerSpec::parse(spec).is_none() {
                    bail!("invalid handler '{}'", spec);
                }
                options.handler = Some(spec.clone());
            }
            "-V" => options.version = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown argument '{}'\n\n{}", other, USAGE),
        }
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = parse_args(&args)?;

    if options.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_tracing("info");

    let mut config = match &options.config {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path))?,
        None => HostConfig::default(),
    };
    if options.handler.is_some() {
        config.handler = options.handler;
    }

    let host = Arc::new(Host::builder().config(config).build());
    host.init().context("host initialization failed")?;

    let transport = Arc::new(CgiTransport::from_process());
    let served = host.handle_async(transport).await;
    host.shutdown();
    served.context("could not deliver a response")?;
    Ok(())
}
