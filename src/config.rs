#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

#[derive(clap::Parser)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "5000")]
    pub port: u16,

    // public base of this service; proxied manifest/segment URLs are built
    // against it so the player routes back through us
    #[clap(long, env, default_value = "http://localhost:5000")]
    pub public_base_url: String,

    // the upstream streaming site's embed endpoint; the content path
    // (movie/{id} or tv/{id}/{season}/{episode}) is appended to it
    #[clap(long, env, default_value = "https://vidsrc.xyz/embed")]
    pub upstream_embed_base: String,

    // server name to switch to on the upstream site's server list
    #[clap(long, env, default_value = "CloudStream Pro")]
    pub target_server: String,

    // explicit chromium binary; when unset the session falls back to a
    // PATH scan and well-known install locations
    #[clap(long, env)]
    pub chrome_executable: Option<String>,

    // mostly for local debugging of the click flow
    #[clap(long, env, default_value = "true")]
    pub browser_headless: bool,

    // external subtitle search API, only consulted when extraction found
    // no embedded or network subtitles
    #[clap(long, env)]
    pub subtitle_api_base: Option<String>,

    #[clap(long, env)]
    pub subtitle_api_key: Option<String>,

    // this should be either * for allowing everything, or a comma seperated list of domains like
    // example.com,something.com
    #[clap(long, env, default_value = "*")]
    pub cors_origin: String,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,
}

impl Default for AppConfig {
    // defaults aren't really needed here but it's here as a bad fallback
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 5000,
            public_base_url: "http://localhost:5000".to_string(),
            upstream_embed_base: "https://vidsrc.xyz/embed".to_string(),
            target_server: "CloudStream Pro".to_string(),
            chrome_executable: None,
            browser_headless: true,
            subtitle_api_base: None,
            subtitle_api_key: None,
            cors_origin: "*".to_string(),
            sentry_dsn: None,
        }
    }
}
