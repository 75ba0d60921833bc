use std::net::SocketAddr;
use std::path::PathBuf;
use argh::FromArgs;

fn default_config_path () -> PathBuf {
    PathBuf::from("./forwarder_config.toml")
}

#[derive(Debug, FromArgs)]
#[argh(description = "caching DNS forwarder")]
pub struct CliArgs {
    #[argh(
        option,
        description = "config file path, default: './forwarder_config.toml'",
        default = "default_config_path()"
    )]
    pub config: PathBuf,

    #[argh(switch, description = "relay every query upstream, never answer from the cache")]
    pub forwarding_only: bool,

    #[argh(option, description = "upstream resolver, overrides the config file")]
    pub upstream: Option<SocketAddr>,
}
