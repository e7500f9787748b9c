#[cfg(test)]
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::thread;
use std::time::{Duration, Instant};
use rand::Rng;
use serialport::SerialPort;
use crate::config::SerialSettings;
use crate::drivers::MonitorError;
/// Something that yields raw telemetry lines.
///
/// `Ok(None)` means the read timeout elapsed without a complete line; callers use
/// it to check for a stop request. Any `Err` is terminal for the link.
pub trait LineSource: Send {
    fn next_line(&mut self) -> Result<Option<String>, MonitorError>;
}
impl<T: LineSource + ?Sized> LineSource for Box<T> {
    fn next_line(&mut self) -> Result<Option<String>, MonitorError> {
        (**self).next_line()
    }
}
/// Longest fragment kept while waiting for a line terminator. Real controller
/// lines are far shorter; anything longer is line noise.
pub const MAX_LINE_BYTES: usize = 1024;
/// Newline framing over a blocking reader whose reads may time out.
///
/// Bytes received before a timeout are kept and completed by later reads, up to
/// `MAX_LINE_BYTES`.
pub struct LineReader<R: BufRead> {
    inner: R,
    pending: Vec<u8>,
}
impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(128),
        }
    }
    pub fn read_line(&mut self) -> Result<Option<String>, MonitorError> {
        loop {
            let available = match self.inner.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::TimedOut => return Ok(None),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(None),
                Err(err) => return Err(MonitorError::LinkIo(err)),
            };
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Err(MonitorError::LinkClosed);
                }
                // Peer hung up mid-line; hand over what we have, the next call sees EOF.
                log::debug!("flushing {} byte(s) of unterminated line", self.pending.len());
                return Ok(Some(self.take_line()));
            }
            let (used, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    self.pending.extend_from_slice(&available[..=end]);
                    (end + 1, true)
                }
                None => {
                    self.pending.extend_from_slice(available);
                    (available.len(), false)
                }
            };
            self.inner.consume(used);
            if complete {
                return Ok(Some(self.take_line()));
            }
            if self.pending.len() > MAX_LINE_BYTES {
                log::debug!(
                    "dropping {} byte(s) without a line terminator",
                    self.pending.len()
                );
                self.pending.clear();
            }
        }
    }
    fn take_line(&mut self) -> String {
        let line = decode_lossy(&self.pending);
        self.pending.clear();
        line
    }
}
/// UTF-8 decode that drops invalid sequences instead of substituting them.
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}
/// Controller link over a real serial port.
pub struct SerialLineSource {
    port_name: String,
    reader: LineReader<BufReader<Box<dyn SerialPort>>>,
}
impl SerialLineSource {
    pub fn open(settings: &SerialSettings) -> Result<Self, MonitorError> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| MonitorError::ConnectionOpen {
                port: settings.port.clone(),
                source,
            })?;
        log::info!(
            "connected to {} at {} baud (read timeout {:?})",
            settings.port,
            settings.baud_rate,
            settings.read_timeout
        );
        Ok(Self {
            port_name: settings.port.clone(),
            reader: LineReader::new(BufReader::new(port)),
        })
    }
}
impl LineSource for SerialLineSource {
    fn next_line(&mut self) -> Result<Option<String>, MonitorError> {
        self.reader.read_line()
    }
}
impl Drop for SerialLineSource {
    fn drop(&mut self) {
        log::info!("closing serial port {}", self.port_name);
    }
}
/// In-memory source for tests. Once the queue is drained it reports the link
/// as closed.
#[cfg(test)]
pub struct ManualSource {
    queue: VecDeque<Option<String>>,
}
#[cfg(test)]
impl ManualSource {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: lines.into_iter().map(|l| Some(l.into())).collect(),
        }
    }
    /// Insert a read timeout at the end of the current queue.
    pub fn push_timeout(&mut self) {
        self.queue.push_back(None);
    }
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.queue.push_back(Some(line.into()));
    }
}
#[cfg(test)]
impl LineSource for ManualSource {
    fn next_line(&mut self) -> Result<Option<String>, MonitorError> {
        self.queue.pop_front().ok_or(MonitorError::LinkClosed)
    }
}
/// Stand-in controller that emits well-formed lines at roughly the nominal
/// interval, walking through the same operating states the plant reports and
/// going quiet now and then.
pub struct SimulatedSource {
    interval: Duration,
    phase: f64,
    step: u64,
    silent_until: Option<Instant>,
}
impl SimulatedSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            phase: 0.0,
            step: 0,
            silent_until: None,
        }
    }
    fn compose_line(&mut self) -> String {
        let mut rng = rand::thread_rng();
        self.phase += 0.05;
        self.step += 1;
        let pressure = 330.0 + 60.0 * self.phase.sin() + rng.gen_range(-3.0..3.0);
        let temperature = 150.0 + 25.0 * (self.phase * 0.7).cos() + rng.gen_range(-1.0..1.0);
        let valve = (45.0 + 20.0 * self.phase.sin()).clamp(0.0, 100.0);
        let superheat = 10.0 + rng.gen_range(-0.5..0.5);
        let flow = if (self.step / 200) % 2 == 0 { "A" } else { "B" };
        let (state, esd, relief) = if pressure > 380.0 {
            ("Advertencia Presion Alta", "Normal", "Cerrada")
        } else if temperature < 130.0 {
            ("Precalentamiento", "Normal", "Cerrada")
        } else {
            ("Operando Normal", "Normal", "Cerrada")
        };
        format!(
            "P:{pressure:.1},T:{temperature:.1},MV:{valve:.1},SH:{superheat:.1},F:{flow},M:AUTO,ESD:{esd},ESTADO:{state},RELIEF:{relief},PURGE:Cerrada"
        )
    }
}
impl LineSource for SimulatedSource {
    fn next_line(&mut self) -> Result<Option<String>, MonitorError> {
        if let Some(until) = self.silent_until {
            if Instant::now() < until {
                thread::sleep(self.interval);
                return Ok(None);
            }
            self.silent_until = None;
        }
        if rand::thread_rng().gen_bool(0.005) {
            // A couple of seconds without telemetry, like a flaky cable.
            self.silent_until = Some(Instant::now() + self.interval * 20);
            return Ok(None);
        }
        thread::sleep(self.interval);
        Ok(Some(self.compose_line()))
    }
}
