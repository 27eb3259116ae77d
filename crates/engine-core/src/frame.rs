//! Compact 4-byte sensor frame: big-endian u16 rpm, u8 temperature,
//! u8 pressure.

pub const RPM_MAX: f64 = 8000.0;
pub const TEMP_MAX: f64 = 150.0;
pub const PRESSURE_MAX: f64 = 400.0;

/// Arbitration id the transmitter uses for this frame.
pub const FRAME_ID: u32 = 0x100;
pub const FRAME_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorFrame {
    pub rpm_raw: u16,
    pub temp_raw: u8,
    pub pressure_raw: u8,
}

/// Scale `value` from `[0, max]` onto `[0, full_scale]`, truncating.
/// NaN maps to zero.
fn scale(value: f64, max: f64, full_scale: f64) -> f64 {
    let clamped = value.clamp(0.0, max);
    if clamped.is_nan() {
        return 0.0;
    }
    clamped / max * full_scale
}

impl SensorFrame {
    pub fn encode(rpm: f64, temp: f64, pressure: f64) -> Self {
        Self {
            rpm_raw: scale(rpm, RPM_MAX, u16::MAX as f64) as u16,
            temp_raw: scale(temp, TEMP_MAX, u8::MAX as f64) as u8,
            pressure_raw: scale(pressure, PRESSURE_MAX, u8::MAX as f64) as u8,
        }
    }

    pub fn to_bytes(self) -> [u8; FRAME_LEN] {
        let [rpm_hi, rpm_lo] = self.rpm_raw.to_be_bytes();
        [rpm_hi, rpm_lo, self.temp_raw, self.pressure_raw]
    }

    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Self {
        Self {
            rpm_raw: u16::from_be_bytes([bytes[0], bytes[1]]),
            temp_raw: bytes[2],
            pressure_raw: bytes[3],
        }
    }

    /// Physical values as `(rpm, temp, pressure)`. Lossy: each field is
    /// accurate to one quantisation step.
    pub fn decode(self) -> (f64, f64, f64) {
        (
            self.rpm_raw as f64 / u16::MAX as f64 * RPM_MAX,
            self.temp_raw as f64 / u8::MAX as f64 * TEMP_MAX,
            self.pressure_raw as f64 / u8::MAX as f64 * PRESSURE_MAX,
        )
    }
}

pub fn encode_frame(rpm: f64, temp: f64, pressure: f64) -> [u8; FRAME_LEN] {
    SensorFrame::encode(rpm, temp, pressure).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_values() {
        assert_eq!(encode_frame(8000.0, 150.0, 400.0), [0xFF, 0xFF, 0xFF, 0xFF]);
        let frame = SensorFrame::encode(8000.0, 150.0, 400.0);
        assert_eq!(frame.rpm_raw, 65535);
        assert_eq!(frame.temp_raw, 255);
        assert_eq!(frame.pressure_raw, 255);
    }

    #[test]
    fn zero_values() {
        assert_eq!(encode_frame(0.0, 0.0, 0.0), [0, 0, 0, 0]);
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(
            encode_frame(12_000.0, 300.0, 1_000.0),
            encode_frame(RPM_MAX, TEMP_MAX, PRESSURE_MAX)
        );
        assert_eq!(encode_frame(-50.0, -10.0, -1.0), [0, 0, 0, 0]);
        assert_eq!(encode_frame(f64::NAN, f64::NAN, f64::NAN), [0, 0, 0, 0]);
    }

    #[test]
    fn big_endian_layout() {
        // 4000 rpm is half scale: 32767 = 0x7FFF
        let bytes = encode_frame(4000.0, 75.0, 200.0);
        assert_eq!(bytes, [0x7F, 0xFF, 127, 127]);
    }

    #[test]
    fn decode_is_within_one_step() {
        let (rpm, temp, pressure) = SensorFrame::from_bytes(encode_frame(3210.0, 92.5, 287.0)).decode();
        assert!((rpm - 3210.0).abs() <= RPM_MAX / 65535.0);
        assert!((temp - 92.5).abs() <= TEMP_MAX / 255.0);
        assert!((pressure - 287.0).abs() <= PRESSURE_MAX / 255.0);
    }
}
