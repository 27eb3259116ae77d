use engine_core::error::SinkError;
use engine_core::frame::{FRAME_ID, FRAME_LEN};
use engine_core::hal::{DataRecord, FrameSink};
use std::fmt::Write as _;
use std::io::{self, Write};

/// One human-readable line per frame.
pub fn format_frame_line(timestamp: f64, frame: [u8; FRAME_LEN], record: &DataRecord) -> String {
    let mut hex = String::with_capacity(FRAME_LEN * 2);
    for byte in frame {
        let _ = write!(hex, "{byte:02x}");
    }
    format!(
        "ID:0x{FRAME_ID:X} | Time:{timestamp:.3} | Data:{hex} | RPM:{:.1} Temp:{:.1} Pres:{:.1}kPa Throttle:{:.2} OilHealth:{:.2} OilTemp:{:.1}C",
        record.rpm, record.temp, record.pressure, record.throttle, record.oil_health, record.oil_temp,
    )
}

/// Prints frames to a text stream in place of a bus.
pub struct ConsoleFrameSink<W: Write> {
    out: W,
    frames_sent: u64,
}

impl ConsoleFrameSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleFrameSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frames_sent: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FrameSink for ConsoleFrameSink<W> {
    fn send_frame(
        &mut self,
        timestamp: f64,
        frame: [u8; FRAME_LEN],
        record: &DataRecord,
    ) -> Result<(), SinkError> {
        writeln!(self.out, "{}", format_frame_line(timestamp, frame, record))?;
        self.frames_sent += 1;
        Ok(())
    }
}
