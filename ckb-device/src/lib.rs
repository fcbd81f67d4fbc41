//! Device state model for Corsair keyboards and mice
//!
//! Profiles, modes, bindings and lighting live here, together with the
//! per-class encoders that turn that state into device packets. All I/O goes
//! through a [`ckb_transport::Transport`].

pub mod binding;
pub mod class;
pub mod device;
pub mod error;
pub mod features;
pub mod input;
pub mod keymap;
pub mod led_mouse;
pub mod lighting;
pub mod profile;

pub use binding::{Binding, KeyMacro, MacroAction, MACRO_MAX};
pub use class::{DeviceClass, DeviceCommand};
pub use device::{Device, DeviceIdentity};
pub use error::DeviceError;
pub use features::Features;
pub use input::{decode_report, InputReport, InputState, KeyBits};
pub use lighting::{Lighting, RgbColor, MOUSE_ZONE_RANGE};
pub use profile::{HwProfile, Indicators, Mode, Profile, UsbId, MODE_COUNT, OUTFIFO_MAX};
