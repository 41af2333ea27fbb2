use crate::prelude::*;

use super::value::MeasurementIndex;

/// Rejections after which the next reading is accepted whatever it is.
pub const OVERRIDE_AFTER: u8 = 2;

const MAX_POWER: f64 = 10_000.0;
const MAX_ENERGY_STEP: f64 = 10_000.0;
const MAX_AC_CURRENT: f64 = 100.0;
const MAX_AC_VOLTAGE: f64 = 550.0;
const MAX_AC_FREQUENCY: f64 = 100.0;
const MAX_DC_CURRENT: f64 = 100.0;
const MAX_DC_VOLTAGE: f64 = 600.0;
const SHUTDOWN_AC_VOLTAGE: f64 = 200.0;

/// What the filter knows about the inverter beyond the value being checked.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Context {
    pub inverter: u8,
    pub dc_voltage: f64,
    pub dc_current: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Filtered {
    pub value: f64,
    pub rejections: u8,
}

impl Filtered {
    fn accept(value: f64) -> Self {
        Self {
            value,
            rejections: 0,
        }
    }

    fn reject(previous: f64, rejections: u8) -> Self {
        Self {
            value: previous,
            rejections: rejections.saturating_add(1),
        }
    }
}

/// Checks `candidate` against plausibility bounds for `index`. A rejected
/// reading keeps `previous` and bumps the counter; once the counter passes
/// [`OVERRIDE_AFTER`] the candidate is taken regardless.
pub fn filter(
    index: u8,
    candidate: f64,
    previous: f64,
    rejections: u8,
    ctx: &Context,
) -> Filtered {
    if rejections > OVERRIDE_AFTER {
        info!(
            "{} Accepting value({}) of {:.1} as valid as count={} although prev={:.1}",
            ctx.inverter, index, candidate, rejections, previous
        );
        return Filtered::accept(candidate);
    }

    let Ok(measurement) = MeasurementIndex::try_from(index) else {
        warn!(
            "{} Discarding unlikely index value of {}",
            ctx.inverter, index
        );
        return Filtered::reject(previous, rejections);
    };

    use MeasurementIndex::*;
    let ceiling = match measurement {
        Power => Some(MAX_POWER),
        AcCurrent => Some(MAX_AC_CURRENT),
        AcVoltage => Some(MAX_AC_VOLTAGE),
        AcFrequency => Some(MAX_AC_FREQUENCY),
        DcCurrent => Some(MAX_DC_CURRENT),
        DcVoltage => Some(MAX_DC_VOLTAGE),
        EnergyTotal | EnergyDay | EnergyYear => None,
    };

    if let Some(ceiling) = ceiling {
        if candidate > ceiling {
            warn!(
                "{} Discarding unlikely {} value of {:.1}",
                ctx.inverter,
                measurement.name(),
                candidate
            );
            return Filtered::reject(previous, rejections);
        }
    }

    match measurement {
        EnergyTotal | EnergyDay | EnergyYear
            if previous > 0.0 && candidate > previous + MAX_ENERGY_STEP =>
        {
            warn!(
                "{} Discarding unlikely ENERGY({}) value of {:.1} (prev {:.1})",
                ctx.inverter, index, candidate, previous
            );
            Filtered::reject(previous, rejections)
        }
        AcVoltage if ctx.dc_voltage > 0.0 => {
            let transition = if candidate < SHUTDOWN_AC_VOLTAGE && previous > SHUTDOWN_AC_VOLTAGE {
                Some("Inverter shutdown (DC brownout)")
            } else if candidate > SHUTDOWN_AC_VOLTAGE && previous < SHUTDOWN_AC_VOLTAGE {
                Some("Recovery from Inverter shutdown")
            } else {
                None
            };

            match transition {
                // the new value is kept, but still counts towards the override
                Some(what) => {
                    warn!(
                        "{} ACV = {:.1}, previously {:.1}. (Vdc {:.1} Idc {:.2}) {}",
                        ctx.inverter, candidate, previous, ctx.dc_voltage, ctx.dc_current, what
                    );
                    Filtered {
                        value: candidate,
                        rejections: rejections.saturating_add(1),
                    }
                }
                None => Filtered::accept(candidate),
            }
        }
        _ => Filtered::accept(candidate),
    }
}
