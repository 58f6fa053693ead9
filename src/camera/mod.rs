//! V4L2 camera interface for Linux
//!
//! Opens a webcam through the Video4Linux2 API and hands decoded frames to
//! the scan session as a [`FrameSource`](crate::source::FrameSource).

mod config;
mod device;

pub use config::{CameraConfig, PixelFormat};
pub use device::{Camera, CameraDevice, CameraProvider};

use crate::error::{Error, Result};
use std::io;

/// Highest `/dev/videoN` index checked during enumeration
const MAX_DEVICE_INDEX: usize = 10;

/// List available V4L2 capture devices.
///
/// Nodes that exist but cannot be opened for lack of permission are remembered, so an
/// empty result caused by access rights surfaces as [`Error::PermissionDenied`]
/// instead of a generic "not found".
pub fn list_devices() -> Result<Vec<CameraDevice>> {
    let mut devices = Vec::new();
    let mut denied = Vec::new();

    for index in 0..MAX_DEVICE_INDEX {
        let path = format!("/dev/video{}", index);

        let dev = match v4l::Device::new(index) {
            Ok(dev) => dev,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                denied.push(path);
                continue;
            }
            Err(_) => continue,
        };

        if let Ok(caps) = dev.query_caps() {
            if caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                devices.push(CameraDevice {
                    index,
                    path,
                    name: caps.card,
                    driver: caps.driver,
                    bus_info: caps.bus,
                });
            }
        }
    }

    if devices.is_empty() {
        if !denied.is_empty() {
            return Err(Error::PermissionDenied(format!(
                "cannot open {} (is the user in the 'video' group?)",
                denied.join(", ")
            )));
        }
        return Err(Error::CameraNotFound(
            "No V4L2 capture devices found".to_string(),
        ));
    }

    Ok(devices)
}

/// Find a camera device by name (case-insensitive substring match)
pub fn find_device_by_name(name: &str) -> Result<CameraDevice> {
    let devices = list_devices()?;
    let name_lower = name.to_lowercase();

    devices
        .into_iter()
        .find(|d| d.name.to_lowercase().contains(&name_lower))
        .ok_or_else(|| Error::CameraNotFound(format!("No device matching '{}'", name)))
}

/// Map an error from opening or configuring a device node onto the crate error type.
pub(crate) fn open_error(path: &str, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_string()),
        io::ErrorKind::NotFound => Error::CameraNotFound(path.to_string()),
        _ => Error::Camera(format!("Failed to open {}: {}", path, err)),
    }
}
