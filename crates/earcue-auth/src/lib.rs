//! Earcue Auth - Device pairing and request authentication
//!
//! # Pairing flow
//!
//! 1. The operator console calls `PairingManager::start_pairing()` and shows
//!    the returned 6-digit code
//! 2. The wearer types the code into the device app, which posts it together
//!    with a device name
//! 3. `PairingManager::complete_pairing()` registers the device and returns
//!    its id and bearer token; the raw token is never shown again
//! 4. Every later device request carries the token in the `Authorization`
//!    header and is checked by [`AuthGuard`]

pub mod guard;
pub mod pairing;

pub use guard::AuthGuard;
pub use pairing::{
    hash_token, DeviceInfo, PairingCompleteRequest, PairingCompleteResponse, PairingError,
    PairingManager, PairingResult, PairingStartResponse,
};
