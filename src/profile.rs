//! # Device Limit Profiles
//!
//! Set-points written to a device are saturated into the limits of its model. The
//! limits come from a JSON file holding one entry per model name, as reported by the
//! device for the model type command, with values in volts and amps:
//!
//! ```json
//! {
//!   "BIC-2200-24": {
//!     "Voltage": 24, "MaxWatt": 2200,
//!     "BoostChargeVoltage": 28.8, "FloatChargeVoltage": 27.6,
//!     "MinChargeVoltage": 19.0, "MaxChargeVoltage": 28.8,
//!     "MinChargeCurrent": 1.0, "MaxChargeCurrent": 65.0,
//!     "MinDisChargeVoltage": 19.0, "MaxDisChargeVoltage": 28.8,
//!     "MinDisChargeCurrent": 1.0, "MaxDisChargeCurrent": 65.0
//!   }
//! }
//! ```
//!
//! Values are stored as integers scaled ×100, the unit used on the wire.

use crate::can::address::{DeviceAddress, DeviceVariant};
use crate::error::MwCanError;
use crate::payload::value::to_centi;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Selects one min/max pair of a [`LimitSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    ChargeVoltage,
    ChargeCurrent,
    DischargeVoltage,
    DischargeCurrent,
}

/// Inclusive ×100 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub min: i64,
    pub max: i64,
}

impl Limit {
    /// Builds a range, rejecting inverted bounds.
    pub fn new(min: i64, max: i64) -> Result<Self, MwCanError> {
        if min > max {
            return Err(MwCanError::Configuration(format!(
                "limit minimum {min} above maximum {max}"
            )));
        }
        Ok(Limit { min, max })
    }

    /// Saturates `value` into the range.
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}

/// Limits of one device model, ×100 scaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitSet {
    pub nominal_voltage: u32,
    pub max_watt: u32,
    pub boost_charge_voltage: Option<i64>,
    pub float_charge_voltage: Option<i64>,
    pub charge_voltage: Limit,
    pub charge_current: Limit,
    pub discharge_voltage: Option<Limit>,
    pub discharge_current: Option<Limit>,
}

impl LimitSet {
    /// The range selected by `kind`, if this model has one.
    pub fn get(&self, kind: LimitKind) -> Option<Limit> {
        match kind {
            LimitKind::ChargeVoltage => Some(self.charge_voltage),
            LimitKind::ChargeCurrent => Some(self.charge_current),
            LimitKind::DischargeVoltage => self.discharge_voltage,
            LimitKind::DischargeCurrent => self.discharge_current,
        }
    }
}

/// One model entry of the limits file, physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelLimits {
    pub voltage: u32,
    pub max_watt: u32,
    #[serde(default)]
    pub boost_charge_voltage: Option<f64>,
    #[serde(default)]
    pub float_charge_voltage: Option<f64>,
    pub min_charge_voltage: f64,
    pub max_charge_voltage: f64,
    pub min_charge_current: f64,
    pub max_charge_current: f64,
    #[serde(default, rename = "MinDisChargeVoltage")]
    pub min_discharge_voltage: Option<f64>,
    #[serde(default, rename = "MaxDisChargeVoltage")]
    pub max_discharge_voltage: Option<f64>,
    #[serde(default, rename = "MinDisChargeCurrent")]
    pub min_discharge_current: Option<f64>,
    #[serde(default, rename = "MaxDisChargeCurrent")]
    pub max_discharge_current: Option<f64>,
}

impl ModelLimits {
    /// Converts to ×100 integers and validates the ranges.
    pub fn to_limit_set(&self) -> Result<LimitSet, MwCanError> {
        let pair = |min: Option<f64>, max: Option<f64>| -> Result<Option<Limit>, MwCanError> {
            match (min, max) {
                (Some(min), Some(max)) => Limit::new(to_centi(min), to_centi(max)).map(Some),
                (None, None) => Ok(None),
                _ => Err(MwCanError::Configuration(
                    "discharge limits need both a minimum and a maximum".into(),
                )),
            }
        };

        Ok(LimitSet {
            nominal_voltage: self.voltage,
            max_watt: self.max_watt,
            boost_charge_voltage: self.boost_charge_voltage.map(to_centi),
            float_charge_voltage: self.float_charge_voltage.map(to_centi),
            charge_voltage: Limit::new(
                to_centi(self.min_charge_voltage),
                to_centi(self.max_charge_voltage),
            )?,
            charge_current: Limit::new(
                to_centi(self.min_charge_current),
                to_centi(self.max_charge_current),
            )?,
            discharge_voltage: pair(self.min_discharge_voltage, self.max_discharge_voltage)?,
            discharge_current: pair(self.min_discharge_current, self.max_discharge_current)?,
        })
    }
}

/// The parsed limits file: model name → limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LimitsFile {
    models: BTreeMap<String, ModelLimits>,
}

impl LimitsFile {
    /// Loads the limits file from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MwCanError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            MwCanError::Configuration(format!("cannot read limits file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, MwCanError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, model: &str, limits: ModelLimits) {
        self.models.insert(model.to_string(), limits);
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Looks up a model; a missing entry is a configuration error.
    pub fn limits_for(&self, model: &str) -> Result<LimitSet, MwCanError> {
        let model = model.trim();
        self.models
            .get(model)
            .ok_or_else(|| {
                MwCanError::Configuration(format!("no limits configured for device '{model}'"))
            })?
            .to_limit_set()
    }
}

/// Everything fixed about the device a session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    address: DeviceAddress,
    model: String,
    limits: LimitSet,
}

impl DeviceProfile {
    /// Builds the profile; a power supply must carry discharge limits.
    pub fn new(address: DeviceAddress, model: &str, limits: LimitSet) -> Result<Self, MwCanError> {
        if address.variant() == DeviceVariant::PowerSupply
            && (limits.discharge_voltage.is_none() || limits.discharge_current.is_none())
        {
            return Err(MwCanError::Configuration(format!(
                "device '{model}' is a {} but has no discharge limits",
                address.variant()
            )));
        }

        let profile = DeviceProfile {
            address,
            model: model.trim().to_string(),
            limits,
        };
        profile.log_limits();
        Ok(profile)
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn variant(&self) -> DeviceVariant {
        self.address.variant()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn limits(&self) -> &LimitSet {
        &self.limits
    }

    fn log_limits(&self) {
        let l = &self.limits;
        info!("Device:              {} ({})", self.model, self.address);
        info!("Voltage:             {} V", l.nominal_voltage);
        info!("MaxWatt:             {} W", l.max_watt);
        info!(
            "ChargeVoltage:       {} .. {} V (0.01)",
            l.charge_voltage.min, l.charge_voltage.max
        );
        info!(
            "ChargeCurrent:       {} .. {} A (0.01)",
            l.charge_current.min, l.charge_current.max
        );
        if let Some(dv) = l.discharge_voltage {
            info!("DisChargeVoltage:    {} .. {} V (0.01)", dv.min, dv.max);
        }
        if let Some(dc) = l.discharge_current {
            info!("DisChargeCurrent:    {} .. {} A (0.01)", dc.min, dc.max);
        }
    }
}
