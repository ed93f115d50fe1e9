use ibl_asteroids::{config::AppConfig, flow};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    flow::run(config)
}
