//! Driver process management - spawning and health checking chromedriver

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Handle to a running chromedriver process
pub struct DriverProcess {
    child: Child,
    pub webdriver_url: String,
    pub port: u16,
}

impl DriverProcess {
    /// Spawn the driver binary and wait until it reports ready
    pub async fn spawn(config: DriverConfig) -> E2eResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let webdriver_url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary_path.display(), port);

        let child = spawn_child(&config.binary_path, port)?;

        let handle = DriverProcess {
            child,
            webdriver_url: webdriver_url.clone(),
            port,
        };

        handle.wait_for_ready(config.startup_timeout).await?;

        info!("WebDriver is ready at {}", webdriver_url);
        Ok(handle)
    }

    /// Poll `/status` until the driver accepts sessions
    async fn wait_for_ready(&self, timeout_duration: Duration) -> E2eResult<()> {
        wait_for_webdriver(&self.webdriver_url, timeout_duration).await
    }

    pub fn webdriver_url(&self) -> &str {
        &self.webdriver_url
    }

    /// Stop the driver
    pub fn stop(&mut self) -> E2eResult<()> {
        info!("Stopping WebDriver (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(200));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();

        Ok(())
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Poll a WebDriver endpoint's `/status` until it answers `ready: true`.
pub async fn wait_for_webdriver(webdriver_url: &str, timeout_duration: Duration) -> E2eResult<()> {
    let status_url = format!("{}/status", webdriver_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    while start.elapsed() < timeout_duration {
        attempts += 1;

        match client.get(&status_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body: serde_json::Value = resp.json().await.unwrap_or_default();
                if is_ready(&body) {
                    return Ok(());
                }
            }
            Ok(resp) => {
                warn!("WebDriver status returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for WebDriver to start...");
                }
                if !e.is_connect() {
                    warn!("WebDriver status error: {}", e);
                }
            }
        }

        sleep(Duration::from_millis(100)).await;
    }

    Err(E2eError::DriverHealthCheck(attempts))
}

/// A `/status` body without a `value.ready` field counts as ready.
fn is_ready(body: &serde_json::Value) -> bool {
    body.pointer("/value/ready")
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
}

/// Configuration for spawning a driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Path to the chromedriver binary
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Timeout for driver startup
    pub startup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("chromedriver"),
            port: None,
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Start the driver binary with its output discarded.
///
/// Nothing reads the driver's output, and a pipe left unread fills up and
/// blocks a chatty driver.
fn spawn_child(binary_path: &Path, port: u16) -> E2eResult<Child> {
    Command::new(binary_path)
        .arg(format!("--port={}", port))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            E2eError::DriverStartup(format!(
                "Failed to spawn {}: {}",
                binary_path.display(),
                e
            ))
        })
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
