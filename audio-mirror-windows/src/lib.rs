//! # audio-mirror-windows
//!
//! Windows WASAPI backend for audio-mirror.
//!
//! Provides:
//! - `WasapiBackend`: `AudioBackend` implementation handed to `AudioRouter`
//! - `WasapiDeviceCatalog`: render endpoint listing and endpoint volume via the MMDevice API
//! - `WasapiLoopbackStream`: loopback capture of a render endpoint
//! - `WasapiRenderStream`: shared-mode render stream in a fixed format
//!
//! ## Platform Requirements
//! - Windows 10 or later
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_mirror_core::{suggest_selection, AudioRouter};
//! use audio_mirror_windows::WasapiBackend;
//!
//! let router = AudioRouter::new(WasapiBackend::new());
//! let devices = router.list_render_devices()?;
//! let default_id = router.default_render_device_id()?;
//! let selection = suggest_selection(&devices, default_id.as_ref());
//!
//! if let (Some(source), Some(mirror)) = (selection.source, selection.mirror) {
//!     router.set_devices(&source, &mirror)?;
//!     router.start()?;
//! }
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
mod stream_thread;
#[cfg(target_os = "windows")]
mod wave_format;

#[cfg(target_os = "windows")]
pub mod backend;
#[cfg(target_os = "windows")]
pub mod device_catalog;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;
#[cfg(target_os = "windows")]
pub mod wasapi_render;

#[cfg(target_os = "windows")]
pub use backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use device_catalog::WasapiDeviceCatalog;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackStream;
#[cfg(target_os = "windows")]
pub use wasapi_render::WasapiRenderStream;
