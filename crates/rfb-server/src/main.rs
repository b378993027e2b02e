//! RFB server demo host entry point.
//!
//! Loads configuration, waits for one VNC viewer, then runs the host loop
//! that animates [`DemoScene`] and feeds it the viewer's input.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML or defaults
//!  └─ VncDriver::establish_on() -- bind, accept, handshake, absorb poll
//!  └─ host loop
//!       ├─ wait_next_event(time until next scene timer)
//!       ├─ event  → DemoScene::handle_event (bell / quit)
//!       └─ none   → DemoScene::fire_timer (next frame)
//! ```

use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rfb_server::application::driver::{Clock, MonotonicClock, VncDriver};
use rfb_server::application::scene::{DemoScene, SceneAction};
use rfb_server::infrastructure::network::engine::UpdatePolicy;
use rfb_server::infrastructure::storage::config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("loading configuration")?;

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.server.log_level)),
        )
        .init();

    info!("RFB server starting");

    let addr = cfg.listen_addr()?;
    let identity = cfg.identity()?;
    let options = cfg.engine_options();
    let clock = MonotonicClock::new();

    let mut scene = DemoScene::new(identity.width, identity.height, clock.now_micros());
    let mut driver = VncDriver::establish_on(addr, &identity, options, scene.canvas(), clock)
        .await
        .with_context(|| format!("serving a viewer on {addr}"))?;

    info!("viewer ready; Escape in the viewer quits");

    loop {
        let now = clock.now_micros();
        let timeout = scene
            .next_timer()
            .map_or(Duration::MAX, |at| Duration::from_micros(at.saturating_sub(now)));

        let repainted = match driver.wait_next_event(scene.canvas(), timeout).await? {
            Some(event) => match scene.handle_event(&event, clock.now_micros()) {
                SceneAction::Continue => false,
                SceneAction::RingBell => {
                    driver.engine_mut().ring_bell().await?;
                    false
                }
                SceneAction::Quit => break,
            },
            None => scene.fire_timer(clock.now_micros()),
        };

        if repainted && options.update_policy == UpdatePolicy::UntilRepaint {
            driver.engine_mut().mark_repainted();
        }
    }

    info!("RFB server stopped after {} ticks", driver.elapsed_ticks());
    Ok(())
}
