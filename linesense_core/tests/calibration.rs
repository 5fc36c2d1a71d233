use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use linesense_core::{CALIBRATION_READS, LineSensor};
use linesense_traits::SensorSource;

struct SeqSource {
    frames: Vec<Vec<u16>>,
    idx: usize,
}
impl SeqSource {
    fn new(frames: impl Into<Vec<Vec<u16>>>) -> Self {
        Self {
            frames: frames.into(),
            idx: 0,
        }
    }
}
impl SensorSource for SeqSource {
    fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn Error + Send + Sync>> {
        let frame = if self.idx < self.frames.len() {
            let f = self.frames[self.idx].clone();
            self.idx += 1;
            f
        } else {
            self.frames.last().cloned().unwrap_or_default()
        };
        Ok(frame)
    }
}

fn sensor_with_frames(n: usize, frames: Vec<Vec<u16>>) -> LineSensor {
    LineSensor::builder()
        .with_source(SeqSource::new(frames))
        .with_sensor_count(n)
        .build()
        .expect("build sensor")
}

#[test]
fn calibrate_performs_exactly_ten_reads() {
    struct CountingSource {
        reads: Arc<AtomicUsize>,
    }
    impl SensorSource for CountingSource {
        fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn Error + Send + Sync>> {
            self.reads.fetch_add(1, Ordering::Relaxed);
            Ok(vec![512; 5])
        }
    }

    let reads = Arc::new(AtomicUsize::new(0));
    let mut sensor = LineSensor::builder()
        .with_source(CountingSource {
            reads: reads.clone(),
        })
        .build()
        .expect("build sensor");

    sensor.calibrate().expect("calibration pass");
    assert_eq!(reads.load(Ordering::Relaxed), CALIBRATION_READS);
}

#[test]
fn intra_burst_swings_cannot_widen_the_bounds() {
    // Ten alternating full-contrast snapshots inside one burst: every channel
    // sees both extremes, so neither its burst minimum nor maximum qualifies
    // against the stored bounds and the bounds stay at their initial values.
    let frames: Vec<Vec<u16>> = (0..10)
        .map(|j| {
            if j % 2 == 0 {
                vec![1023, 0, 1023, 0, 1023]
            } else {
                vec![0, 1023, 0, 1023, 0]
            }
        })
        .collect();
    let mut sensor = sensor_with_frames(5, frames);

    sensor.calibrate().expect("calibration pass");
    assert_eq!(sensor.calibrated_min(), &[1023; 5]);
    assert_eq!(sensor.calibrated_max(), &[0; 5]);
}

#[test]
fn steady_bursts_widen_bounds_monotonically() {
    // Three constant bursts at 600, then 200, then 900.
    let mut frames = vec![vec![600u16; 5]; 10];
    frames.extend(vec![vec![200u16; 5]; 10]);
    frames.extend(vec![vec![900u16; 5]; 10]);
    let mut sensor = sensor_with_frames(5, frames);

    sensor.calibrate().expect("first burst");
    assert_eq!(sensor.calibrated_min(), &[600; 5]);
    assert_eq!(sensor.calibrated_max(), &[600; 5]);

    sensor.calibrate().expect("second burst");
    assert_eq!(sensor.calibrated_min(), &[200; 5]);
    assert_eq!(sensor.calibrated_max(), &[600; 5]);

    sensor.calibrate().expect("third burst");
    assert_eq!(sensor.calibrated_min(), &[200; 5]);
    assert_eq!(sensor.calibrated_max(), &[900; 5]);
}

#[test]
fn degenerate_channel_always_normalizes_to_zero() {
    // A channel that never saw contrast has min == max; its normalized value
    // is pinned to 0 whatever the raw input.
    let mut sensor = sensor_with_frames(3, vec![vec![500; 3]; 10]);
    sensor.calibrate().expect("flat burst");
    assert_eq!(sensor.calibrated_min(), &[500; 3]);
    assert_eq!(sensor.calibrated_max(), &[500; 3]);

    for raw in [[0u16, 499, 1023], [500, 500, 500], [1, 742, 999]] {
        assert_eq!(sensor.normalize(&raw).expect("normalize"), vec![0, 0, 0]);
    }
}

#[test]
fn further_calibration_interleaves_with_reads() {
    // Full-range bursts, a read, then a flat mid-scale burst: the extra burst
    // lies inside the recorded range and must not re-tighten it.
    let mut frames = vec![vec![1023u16; 5]; 10];
    frames.extend(vec![vec![0u16; 5]; 10]);
    frames.push(vec![0, 1023, 0, 0, 0]);
    frames.extend(vec![vec![500u16; 5]; 10]);
    frames.push(vec![0, 1023, 0, 0, 0]);
    let mut sensor = sensor_with_frames(5, frames);

    sensor.calibrate().expect("dark burst");
    sensor.calibrate().expect("light burst");
    let first = sensor.read_line(false).expect("read line");
    assert_eq!(first.position, 1000);

    sensor.calibrate().expect("mid burst");
    assert_eq!(sensor.calibrated_min(), &[0; 5]);
    assert_eq!(sensor.calibrated_max(), &[1023; 5]);

    let second = sensor.read_line(false).expect("read line");
    assert_eq!(second.position, 1000);
}
