use crate::client::AdbClient;
use crate::error::AdbResult;
use crate::png;

/// A single screen capture: PNG bytes plus the dimensions/density recovered
/// from them, so callers don't need to re-decode the PNG themselves.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub png_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Physical screen density in dpi, if `wm density` reported one.
    pub density: Option<u32>,
}

/// Take a screenshot via `screencap -p` and `wm density`.
pub async fn take(client: &AdbClient, serial: &str) -> AdbResult<Screenshot> {
    let png_data = client.shell_raw(Some(serial), "screencap -p").await?;
    let dims = png::parse_dimensions(&png_data)?;
    let density_output = client.shell(Some(serial), "wm density").await.ok();
    let density = density_output.as_deref().and_then(parse_density);

    Ok(Screenshot {
        png_data,
        width: dims.width,
        height: dims.height,
        density,
    })
}

/// `wm density` can print more than one line, e.g.:
///
/// ```text
/// Physical density: 420
/// Override density: 400
/// ```
///
/// The first `Physical density: N` line wins; `Override density` lines are
/// ignored, so a device with a user-set display override still reports its
/// native pixel density.
fn parse_density(output: &str) -> Option<u32> {
    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Physical density:") {
            if let Ok(v) = rest.trim().parse::<u32>() {
                return Some(v);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_density_physical_only() {
        assert_eq!(parse_density("Physical density: 420\n"), Some(420));
    }

    #[test]
    fn test_parse_density_prefers_physical_over_override() {
        let output = "Physical density: 420\nOverride density: 400\n";
        assert_eq!(parse_density(output), Some(420));
    }

    #[test]
    fn test_parse_density_override_only_is_ignored() {
        assert_eq!(parse_density("Override density: 400\n"), None);
    }

    #[test]
    fn test_parse_density_malformed() {
        assert_eq!(parse_density("nonsense\n"), None);
    }
}
