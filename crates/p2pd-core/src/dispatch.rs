// ── Operation dispatch ──
//
// Routes a guarded `Operation` to the engine and maps engine outcomes
// onto the closed status vocabulary. Argument validation happens here,
// before anything reaches the engine.

use bytes::Bytes;
use tracing::{debug, info};

use crate::command::{ConnectRequest, GroupConfigRequest, Operation, Reply};
use crate::config::P2pSettings;
use crate::engine::{ConnectParams, GroupParams, P2pEngine};
use crate::error::{EngineError, StatusCode, StatusError};
use crate::guard::{IfaceResolver, validate_and_call};
use crate::iface::InterfaceHandle;
use crate::join::{JoinCoordinator, JoinRequest};
use crate::model::{
    DeviceInfo, FrameTypeMask, IfaceStatus, IfaceType, MacAddr, NetworkId, NetworkKind,
    NetworkSummary, NewNetwork, Passphrase, RawAddr, ScanType, ServiceRecord, Ssid,
    WpsDeviceType, WpsProvisionMethod, format_pin, wps::wfd_subelement,
};

/// Longest WPS device name the engine accepts.
pub const WPS_DEV_NAME_MAX_LEN: usize = 32;
/// Highest group-owner intent a peer may advertise.
pub const GO_INTENT_MAX: u32 = 15;
const WFD_DEVICE_INFO_LEN: usize = wfd_subelement::DEVICE_INFO_LEN;

/// Borrowed view of the loop state an operation may touch.
pub(crate) struct Dispatcher<'a, E: P2pEngine + ?Sized> {
    pub engine: &'a mut E,
    pub join: &'a mut JoinCoordinator,
    pub settings: &'a P2pSettings,
}

impl<E: P2pEngine + ?Sized> IfaceResolver for Dispatcher<'_, E> {
    fn interface_exists(&self, iface: &str) -> bool {
        self.engine.interface_exists(iface)
    }
}

impl<E: P2pEngine + ?Sized> Dispatcher<'_, E> {
    /// Guard `handle`, then run `op` against it.
    pub fn dispatch(&mut self, handle: &InterfaceHandle, op: Operation) -> Result<Reply, StatusError> {
        let name = op.name();
        let result = validate_and_call(handle, StatusCode::FailureIfaceInvalid, self, |d, iface| {
            d.route(iface, op)
        });
        if let Err(e) = &result {
            debug!(iface = handle.name(), op = name, code = %e.code(), error = %e, "operation failed");
        }
        result
    }

    fn status(&self, iface: &str) -> IfaceStatus {
        self.engine.interface_status(iface).unwrap_or_default()
    }

    fn group_params(&self, iface: &str) -> GroupParams {
        GroupParams::from_settings(self.settings, self.engine.edmg(iface))
    }

    fn require_group(&self, group: &str) -> Result<(), StatusError> {
        if self.engine.group_exists(group) {
            Ok(())
        } else {
            Err(StatusError::IfaceUnknown {
                iface: group.to_owned(),
            })
        }
    }

    fn require_enabled(&self, iface: &str) -> Result<(), StatusError> {
        if self.status(iface).interface_disabled {
            return Err(StatusError::IfaceDisabled {
                iface: iface.to_owned(),
            });
        }
        Ok(())
    }

    fn require_p2p(&self, iface: &str) -> Result<(), StatusError> {
        if self.status(iface).p2p_disabled {
            return Err(StatusError::IfaceDisabled {
                iface: iface.to_owned(),
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn route(&mut self, iface: &str, op: Operation) -> Result<Reply, StatusError> {
        match op {
            // ── Identity & networks ──────────────────────────────────
            Operation::GetName => Ok(Reply::Name(iface.to_owned())),
            Operation::GetType => Ok(Reply::Type(IfaceType::P2p)),
            Operation::AddNetwork => {
                let id = self.engine.add_network(iface, NewNetwork::blank())?;
                Ok(Reply::NetworkId(id))
            }
            Operation::RemoveNetwork { id } => {
                if self.engine.network(iface, id).is_none() {
                    return Err(StatusError::NetworkUnknown { id });
                }
                self.engine.remove_network(iface, id)?;
                Ok(Reply::Ok)
            }
            Operation::GetNetwork { id } => self
                .engine
                .network(iface, id)
                .map(|p| Reply::Network(NetworkSummary::from(&p)))
                .ok_or(StatusError::NetworkUnknown { id }),
            Operation::ListNetworks => Ok(Reply::Networks(self.engine.network_ids(iface))),
            Operation::GetDeviceAddress => Ok(Reply::Address(self.engine.device_address(iface)?)),
            Operation::SetSsidPostfix { postfix } => {
                self.engine.set_ssid_postfix(iface, postfix.as_bytes())?;
                Ok(Reply::Ok)
            }
            Operation::SetGroupIdle {
                group,
                timeout_secs,
            } => {
                self.require_group(&group)?;
                self.engine.set_group_idle(&group, timeout_secs)?;
                Ok(Reply::Ok)
            }
            Operation::SetPowerSave { group, enable } => {
                self.require_group(&group)?;
                self.engine.set_power_save(&group, enable)?;
                Ok(Reply::Ok)
            }
            Operation::SaveConfig => {
                self.engine.save_config(iface)?;
                Ok(Reply::Ok)
            }

            // ── Discovery ────────────────────────────────────────────
            Operation::Find { timeout_secs } => self.find(iface, ScanType::Full, timeout_secs),
            Operation::FindWithParams(req) => self.find(iface, req.scan, req.timeout_secs),
            Operation::StopFind => {
                self.require_enabled(iface)?;
                self.join.abandon(&mut *self.engine, Some(iface), "discovery stopped");
                self.engine.stop_find(iface);
                Ok(Reply::Ok)
            }
            Operation::Flush => {
                self.engine.flush(iface);
                Ok(Reply::Ok)
            }
            Operation::ConfigureExtListen {
                period_ms,
                interval_ms,
            } => {
                self.engine
                    .configure_ext_listen(iface, period_ms, interval_ms)?;
                Ok(Reply::Ok)
            }
            Operation::SetListenChannel {
                channel,
                operating_class,
            } => {
                self.engine
                    .set_listen_channel(iface, channel, operating_class)?;
                Ok(Reply::Ok)
            }
            Operation::SetDisallowedFrequencies { ranges } => {
                if let Some(bad) = ranges.iter().find(|r| r.min > r.max) {
                    return Err(StatusError::args(format!(
                        "frequency range {}-{} is inverted",
                        bad.min, bad.max
                    )));
                }
                self.engine.set_disallowed_frequencies(iface, &ranges)?;
                Ok(Reply::Ok)
            }

            // ── Connection & groups ──────────────────────────────────
            Operation::Connect(req) => self.connect(iface, req),
            Operation::CancelConnect => {
                let abandoned =
                    self.join
                        .abandon(&mut *self.engine, Some(iface), "connection cancelled");
                match self.engine.cancel_connect(iface) {
                    Ok(()) => Ok(Reply::Ok),
                    Err(e) if abandoned => {
                        debug!(iface, error = %e, "nothing to cancel beyond the pending join");
                        Ok(Reply::Ok)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Operation::ProvisionDiscovery { peer, method } => {
                let peer = peer.to_mac()?;
                self.engine.provision_discovery(iface, peer, method)?;
                Ok(Reply::Ok)
            }
            Operation::Reject { peer } => {
                self.require_p2p(iface)?;
                let peer = peer.to_mac()?;
                self.engine.reject(iface, peer)?;
                Ok(Reply::Ok)
            }
            Operation::Invite {
                group,
                go_device,
                peer,
            } => {
                let go_device = go_device.to_mac()?;
                let peer = peer.to_mac()?;
                self.engine.invite(iface, &group, go_device, peer)?;
                Ok(Reply::Ok)
            }
            Operation::Reinvoke { network, peer } => {
                self.require_persistent(iface, network)?;
                let peer = peer.to_mac()?;
                self.engine.reinvoke(iface, network, peer)?;
                Ok(Reply::Ok)
            }
            Operation::AddGroup {
                persistent,
                network,
            } => self.add_group(iface, persistent, network),
            Operation::AddGroupWithConfig(req) => self.add_group_with_config(iface, req),
            Operation::RemoveGroup { group } => {
                self.require_group(&group)?;
                self.engine.remove_group(&group)?;
                Ok(Reply::Ok)
            }
            Operation::RemoveClient { peer, legacy } => {
                let peer = peer.to_mac()?;
                self.engine.remove_client(iface, peer, legacy)?;
                Ok(Reply::Ok)
            }
            Operation::GetSsid { peer } => {
                let peer = peer.to_mac()?;
                let ssid = self.engine.peer_ssid(iface, peer)?;
                Ok(Reply::Ssid(ssid.into()))
            }
            Operation::GetGroupCapability { peer } => {
                let peer = peer.to_mac()?;
                Ok(Reply::GroupCapability(
                    self.engine.peer_group_capability(iface, peer)?,
                ))
            }

            // ── Service discovery ────────────────────────────────────
            Operation::AddBonjourService { query, response } => {
                if query.is_empty() {
                    return Err(StatusError::unknown("empty bonjour query"));
                }
                let record = ServiceRecord::Bonjour {
                    query: query.into_inner(),
                    response: response.into_inner(),
                };
                self.engine.add_service(iface, record)?;
                Ok(Reply::Ok)
            }
            Operation::RemoveBonjourService { query } => {
                let record = ServiceRecord::Bonjour {
                    query: query.into_inner(),
                    response: Vec::new(),
                };
                self.engine.remove_service(iface, &record)?;
                Ok(Reply::Ok)
            }
            Operation::AddUpnpService { version, name } => {
                self.engine
                    .add_service(iface, ServiceRecord::Upnp { version, name })?;
                Ok(Reply::Ok)
            }
            Operation::RemoveUpnpService { version, name } => {
                self.engine
                    .remove_service(iface, &ServiceRecord::Upnp { version, name })?;
                Ok(Reply::Ok)
            }
            Operation::FlushServices => {
                self.engine.flush_services(iface);
                Ok(Reply::Ok)
            }
            Operation::RequestServiceDiscovery { peer, query } => {
                let peer = optional_addr(Some(peer))?;
                match self
                    .engine
                    .request_service_discovery(iface, peer, query.as_bytes())
                {
                    0 => Err(StatusError::unknown("service discovery request failed")),
                    id => Ok(Reply::RequestId(id)),
                }
            }
            Operation::CancelServiceDiscovery { id } => {
                self.engine.cancel_service_discovery(iface, id)?;
                Ok(Reply::Ok)
            }

            // ── WPS ──────────────────────────────────────────────────
            Operation::StartWpsPbc { group, bssid } => {
                self.require_group(&group)?;
                let bssid = optional_addr(bssid)?;
                self.engine.wps_pbc(&group, bssid)?;
                Ok(Reply::Ok)
            }
            Operation::StartWpsPinKeypad { group, pin } => {
                self.require_group(&group)?;
                self.engine.wps_pin_keypad(&group, &pin)?;
                Ok(Reply::Ok)
            }
            Operation::StartWpsPinDisplay { group, bssid } => {
                self.require_group(&group)?;
                let bssid = optional_addr(bssid)?;
                let pin = self.engine.wps_pin_display(&group, bssid)?;
                Ok(Reply::Pin(format_pin(pin)))
            }
            Operation::CancelWps { group } => {
                self.require_group(&group)?;
                self.engine.wps_cancel(&group)?;
                Ok(Reply::Ok)
            }
            Operation::SetWpsDeviceName { name } => {
                if name.len() > WPS_DEV_NAME_MAX_LEN {
                    return Err(StatusError::args(format!(
                        "device name longer than {WPS_DEV_NAME_MAX_LEN} bytes"
                    )));
                }
                self.set_device_info(iface, DeviceInfo::Name(name))
            }
            Operation::SetWpsDeviceType { device_type } => {
                let device_type = WpsDeviceType::try_from(device_type.as_bytes())?;
                self.set_device_info(iface, DeviceInfo::DeviceType(device_type))
            }
            Operation::SetWpsManufacturer { manufacturer } => {
                self.set_device_info(iface, DeviceInfo::Manufacturer(manufacturer))
            }
            Operation::SetWpsModelName { model_name } => {
                self.set_device_info(iface, DeviceInfo::ModelName(model_name))
            }
            Operation::SetWpsModelNumber { model_number } => {
                self.set_device_info(iface, DeviceInfo::ModelNumber(model_number))
            }
            Operation::SetWpsSerialNumber { serial_number } => {
                self.set_device_info(iface, DeviceInfo::SerialNumber(serial_number))
            }
            Operation::SetWpsConfigMethods { methods } => {
                self.set_device_info(iface, DeviceInfo::ConfigMethods(methods))
            }

            // ── Wi-Fi Display ────────────────────────────────────────
            Operation::EnableWfd { enable } => {
                self.engine.set_wfd_enabled(iface, enable)?;
                Ok(Reply::Ok)
            }
            Operation::SetWfdDeviceInfo { info } => {
                if info.len() != WFD_DEVICE_INFO_LEN {
                    return Err(StatusError::args(format!(
                        "WFD device info must be {WFD_DEVICE_INFO_LEN} bytes, got {}",
                        info.len()
                    )));
                }
                let command = format!(
                    "{} {}{info}",
                    wfd_subelement::DEVICE_INFO,
                    wfd_subelement::DEVICE_INFO_LEN_HEX
                );
                self.engine.set_wfd_subelement(iface, &command)?;
                Ok(Reply::Ok)
            }
            Operation::SetWfdR2DeviceInfo { info } => {
                let command = format!("{} {info}", wfd_subelement::R2_DEVICE_INFO);
                self.engine.set_wfd_subelement(iface, &command)?;
                Ok(Reply::Ok)
            }
            Operation::SetMiracastMode { mode } => {
                self.engine.driver_command(iface, &mode.driver_command())?;
                Ok(Reply::Ok)
            }

            // ── NFC ──────────────────────────────────────────────────
            Operation::CreateNfcHandoverRequest => Ok(Reply::Bytes(
                self.engine.nfc_handover_request(iface)?.into(),
            )),
            Operation::CreateNfcHandoverSelect => Ok(Reply::Bytes(
                self.engine.nfc_handover_select(iface)?.into(),
            )),
            Operation::ReportNfcHandoverResponse { request } => {
                self.engine
                    .nfc_report_handover(iface, false, request.as_bytes())?;
                Ok(Reply::Ok)
            }
            Operation::ReportNfcHandoverInitiation { select } => {
                self.engine
                    .nfc_report_handover(iface, true, select.as_bytes())?;
                Ok(Reply::Ok)
            }

            // ── Misc ─────────────────────────────────────────────────
            Operation::SetVendorElements { mask, elements } => {
                let payload = (!elements.is_empty()).then(|| Bytes::from(elements.into_inner()));
                for frame in FrameTypeMask(mask).frame_types() {
                    self.engine.set_vendor_elements(iface, frame, payload.clone());
                }
                Ok(Reply::Ok)
            }
            Operation::ConfigureEapolIpAllocation(alloc) => {
                debug!(iface, go = %alloc.go, start = %alloc.start, end = %alloc.end, "EAPOL IP allocation");
                self.engine.set_ip_allocation(iface, &alloc)?;
                Ok(Reply::Ok)
            }
            Operation::SetMacRandomization { enable } => self.set_mac_randomization(iface, enable),
            Operation::SetEdmg { enable } => {
                self.engine.set_edmg(iface, enable);
                Ok(Reply::Ok)
            }
            Operation::GetEdmg => Ok(Reply::Edmg(self.engine.edmg(iface))),
        }
    }

    fn find(&mut self, iface: &str, scan: ScanType, timeout_secs: u32) -> Result<Reply, StatusError> {
        self.require_enabled(iface)?;
        self.engine.find(iface, scan, timeout_secs)?;
        Ok(Reply::Ok)
    }

    fn connect(&mut self, iface: &str, req: ConnectRequest) -> Result<Reply, StatusError> {
        if req.go_intent > GO_INTENT_MAX {
            return Err(StatusError::args(format!(
                "GO intent {} exceeds {GO_INTENT_MAX}",
                req.go_intent
            )));
        }
        let peer = req.peer.to_mac()?;
        let go_intent = if req.join_existing_group {
            None
        } else {
            u8::try_from(req.go_intent).ok()
        };
        let wants_generated_pin = req.method == WpsProvisionMethod::Display && req.pin.is_empty();
        let params = ConnectParams {
            peer,
            method: req.method,
            pin: (!req.pin.is_empty()).then_some(req.pin),
            join_existing_group: req.join_existing_group,
            persistent: req.persistent,
            go_intent,
            params: self.group_params(iface),
        };
        let generated = self.engine.connect(iface, &params)?;
        let pin = match generated {
            Some(pin) if wants_generated_pin => format_pin(pin),
            _ => String::new(),
        };
        Ok(Reply::Pin(pin))
    }

    fn require_persistent(&self, iface: &str, id: NetworkId) -> Result<(), StatusError> {
        match self.engine.network(iface, id) {
            Some(p) if p.kind == NetworkKind::PersistentGroup => Ok(()),
            _ => Err(StatusError::NetworkUnknown { id }),
        }
    }

    fn add_group(
        &mut self,
        iface: &str,
        persistent: bool,
        network: Option<NetworkId>,
    ) -> Result<Reply, StatusError> {
        let params = self.group_params(iface);
        let profile = network.and_then(|id| self.engine.network(iface, id));
        match profile {
            None => {
                self.engine.group_add(iface, persistent, 0, &params)?;
            }
            Some(p) if p.kind == NetworkKind::PersistentGroup => {
                self.engine
                    .group_add_persistent(iface, p.id, 0, &params)
                    .map_err(|_| StatusError::NetworkUnknown { id: p.id })?;
            }
            Some(p) => {
                return Err(StatusError::unknown(format!(
                    "network {} is not a persistent group",
                    p.id
                )));
            }
        }
        Ok(Reply::Ok)
    }

    fn add_group_with_config(
        &mut self,
        iface: &str,
        req: GroupConfigRequest,
    ) -> Result<Reply, StatusError> {
        self.require_p2p(iface)?;
        let ssid = Ssid::new(req.ssid_bytes())?;
        let passphrase = Passphrase::new(&req.passphrase)?;
        info!(
            iface,
            role = if req.join_existing_group { "client" } else { "go" },
            %ssid,
            freq = req.freq,
            "add group with config"
        );

        if !req.join_existing_group {
            self.engine
                .set_group_credentials(iface, &ssid, &passphrase)?;
            let params = self.group_params(iface);
            self.engine.group_add(iface, req.persistent, req.freq, &params)?;
            return Ok(Reply::Ok);
        }

        let group_owner = req
            .peer
            .to_mac()
            .map_err(|_| StatusError::args("Peer address is invalid."))?;
        let ticket = self.join.begin(
            &mut *self.engine,
            iface,
            JoinRequest {
                ssid,
                passphrase,
                group_owner,
                freq: req.freq,
            },
        )?;
        Ok(Reply::JoinScheduled(ticket))
    }

    fn set_device_info(&mut self, iface: &str, info: DeviceInfo) -> Result<Reply, StatusError> {
        self.engine.set_device_info(iface, info)?;
        Ok(Reply::Ok)
    }

    fn set_mac_randomization(&mut self, iface: &str, enable: bool) -> Result<Reply, StatusError> {
        let current = self.engine.mac_randomization(iface);
        if current == enable {
            debug!(iface, enable, "MAC randomization already in requested state");
            return Ok(Reply::Ok);
        }

        self.engine.set_mac_randomization(iface, enable);
        if let Err(e) = self.engine.apply_mac_address(iface) {
            self.engine.set_mac_randomization(iface, current);
            return Err(match (e, enable) {
                (EngineError::NotSupported, _) => StatusError::unsupported(
                    "Failed to set up MAC address, feature not supported.",
                ),
                (_, true) => StatusError::unknown("Failed to set up MAC address."),
                (_, false) => StatusError::unknown("Failed to restore MAC address."),
            });
        }
        info!(iface, enable, "MAC randomization updated");
        Ok(Reply::Ok)
    }
}

/// Absent, empty, or all-zero means "any".
fn optional_addr(raw: Option<RawAddr>) -> Result<Option<MacAddr>, StatusError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.as_bytes().is_empty() {
        return Ok(None);
    }
    let mac = raw.to_mac()?;
    Ok((!mac.is_zero()).then_some(mac))
}
