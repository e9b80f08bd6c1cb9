// ── Domain model ──
//
// Value types shared by dispatch, the join coordinator, the engine
// trait, and the observers. Everything here is plain data.

pub mod addr;
pub mod credentials;
pub mod discovery;
pub mod frame;
pub mod hex;
pub mod network;
pub mod wps;

pub use addr::{AddrParseError, ETH_ALEN, MacAddr, RawAddr};
pub use credentials::{PASSPHRASE_MAX_LEN, PASSPHRASE_MIN_LEN, Passphrase, SSID_MAX_LEN, Ssid};
pub use discovery::{
    FreqRange, IpAllocation, JoinTarget, RadioWorkId, ScanEntry, ScanType, ServiceRecord,
};
pub use frame::{FrameType, FrameTypeMask, VendorElementSet};
pub use hex::{HexBytes, HexParseError};
pub use network::{
    IfaceContext, IfaceStatus, IfaceType, NetworkId, NetworkKind, NetworkProfile,
    NetworkSummary, NewNetwork,
};
pub use wps::{DeviceInfo, MiracastMode, WpsDeviceType, WpsProvisionMethod, format_pin};
