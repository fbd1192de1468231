use crate::generator::profile::AccelGenerator;
use breathcore::acquisition::Ingestor;
use std::time::{Duration, Instant};

/// Plays generated readings into a pipeline buffer at the sensor rate.
///
/// Stops after `limit` samples, or as soon as the buffer is closed.
pub struct SyntheticSensor {
    generator: AccelGenerator,
    ingestor: Ingestor,
    period: Duration,
    limit: Option<u64>,
}

impl SyntheticSensor {
    /// `speed` > 1 replays faster than real time; 0 disables pacing.
    pub fn new(
        generator: AccelGenerator,
        ingestor: Ingestor,
        sample_rate_hz: f64,
        speed: f64,
        limit: Option<u64>,
    ) -> Self {
        let period = if speed > 0.0 && sample_rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / (sample_rate_hz * speed))
        } else {
            Duration::ZERO
        };
        Self {
            generator,
            ingestor,
            period,
            limit,
        }
    }

    /// Blocking producer loop; returns how many samples were accepted.
    pub fn run(mut self) -> u64 {
        let started = Instant::now();
        while self.limit.map_or(true, |limit| self.ingestor.ingested() < limit) {
            let Some([x, y, z]) = self.generator.next() else {
                break;
            };
            if !self.ingestor.ingest_raw(x, y, z) {
                log::info!("sensor stopped: buffer closed");
                break;
            }
            if !self.period.is_zero() {
                let due = started + self.period * self.ingestor.ingested() as u32;
                let now = Instant::now();
                if due > now {
                    std::thread::sleep(due - now);
                }
            }
        }
        self.ingestor.ingested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::GeneratorConfig;
    use breathcore::processing::SampleBuffer;
    use std::sync::Arc;

    #[test]
    fn unpaced_sensor_stops_at_limit() {
        let config = GeneratorConfig::default();
        let buffer = Arc::new(SampleBuffer::with_capacity(1000));
        let sensor = SyntheticSensor::new(
            AccelGenerator::new(&config, 20.0),
            Ingestor::new(buffer.clone(), config.scale),
            20.0,
            0.0,
            Some(250),
        );
        assert_eq!(sensor.run(), 250);
        assert_eq!(buffer.len(), 250);

        // Wide-range counts arrive converted to m/s².
        let magnitude = buffer.snapshot(1)[0].magnitude;
        assert!((magnitude - 9.81).abs() < 0.3);
    }

    #[test]
    fn closed_buffer_stops_sensor() {
        let config = GeneratorConfig::default();
        let buffer = Arc::new(SampleBuffer::with_capacity(100));
        let sensor = SyntheticSensor::new(
            AccelGenerator::new(&config, 20.0),
            Ingestor::new(buffer.clone(), config.scale),
            20.0,
            10.0,
            None,
        );
        let handle = std::thread::spawn(move || sensor.run());
        std::thread::sleep(Duration::from_millis(100));
        buffer.close();
        let produced = handle.join().unwrap();
        assert!(produced > 0);
        assert!(produced < 1000);
    }
}
