use anyhow::Result;

fn main() -> Result<()> {
    env_logger::init();
    aether::run()
}
