//! Replays small recorded sessions from disk and checks the written records

use approx::assert_relative_eq;
use featcrate_algorithms::PipelineConfig;
use featcrate_core::{Point3f, PointCloud, ESF_SIZE, VFH_SIZE};
use featcrate_extract::{extract_session, DriverConfig, FrameObserver, NoopObserver};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const IDENTITY: &str = "1,0,0,0\n0,1,0,0\n0,0,1,0\n0,0,0,1\n";

fn workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("featcrate_e2e_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("out")).unwrap();
    dir
}

fn cube_record(text: &mut String, channel: &str, timestamp: f64) {
    writeln!(text, "{},{},1000", channel, timestamp).unwrap();
    for i in 0..10 {
        for j in 0..10 {
            for k in 0..10 {
                writeln!(text, "{},{},{}", i as f32 * 0.01, j as f32 * 0.01, 1.0 + k as f32 * 0.01).unwrap();
            }
        }
    }
}

fn write_session(dir: &Path, session: &str) {
    let mut text = String::from("# three captures of a cube\n");
    cube_record(&mut text, "/cloth/cloud", 100.0);
    writeln!(text, "/camera/depth,100.2,1\n0,0,0").unwrap();
    cube_record(&mut text, "/cloth/cloud", 100.5);
    cube_record(&mut text, "/cloth/cloud", 101.0);
    fs::write(dir.join(format!("{}Cloud.txt", session)), text).unwrap();
    fs::write(dir.join("calibration.txt"), IDENTITY).unwrap();
}

fn config(dir: &Path) -> DriverConfig {
    DriverConfig {
        rate_hz: None,
        input_dir: dir.to_path_buf(),
        output_dir: dir.join("out"),
        ..DriverConfig::default()
    }
}

fn read_lines(path: PathBuf) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().map(str::to_string).collect()
}

/// Split a cloud stream into `(elapsed, points)` blocks
fn read_blocks(path: PathBuf) -> Vec<(f64, Vec<Point3f>)> {
    let lines = read_lines(path);
    let mut blocks = Vec::new();
    let mut index = 0;
    while index < lines.len() {
        let header: Vec<&str> = lines[index].split(',').collect();
        assert_eq!(header.len(), 2);
        let elapsed: f64 = header[0].parse().unwrap();
        let count: usize = header[1].parse().unwrap();
        let points = lines[index + 1..index + 1 + count]
            .iter()
            .map(|line| {
                let v: Vec<f32> = line.split(',').map(|f| f.parse().unwrap()).collect();
                assert_eq!(v.len(), 3);
                Point3f::new(v[0], v[1], v[2])
            })
            .collect();
        blocks.push((elapsed, points));
        index += 1 + count;
    }
    blocks
}

#[test]
fn test_cube_session() {
    let dir = workspace("cube");
    write_session(&dir, "cube");

    let summary = extract_session(
        "cube",
        &dir.join("calibration.txt"),
        &config(&dir),
        PipelineConfig::default(),
        &mut NoopObserver,
    )
    .unwrap();
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.duration, 1.0);

    let out = dir.join("out");
    let vfh = read_lines(out.join("cubeVFH"));
    let esf = read_lines(out.join("cubeESF"));
    assert_eq!(vfh.len(), 3);
    assert_eq!(esf.len(), 3);

    for (line, expected) in vfh.iter().zip([0.0, 0.5, 1.0]) {
        let fields: Vec<f64> = line.split(',').map(|f| f.parse().unwrap()).collect();
        assert_eq!(fields.len(), VFH_SIZE + 1);
        assert_eq!(fields[0], expected);
        assert!(fields[1..].iter().any(|&v| v > 0.0));
    }
    for (line, expected) in esf.iter().zip([0.0, 0.5, 1.0]) {
        let fields: Vec<f64> = line.split(',').map(|f| f.parse().unwrap()).collect();
        assert_eq!(fields.len(), ESF_SIZE + 1);
        assert_eq!(fields[0], expected);
        assert_relative_eq!(fields[1..].iter().sum::<f64>(), 1.0, epsilon = 1e-3);
    }

    // identical captures give identical descriptors
    let strip = |line: &String| line.split_once(',').map(|(_, rest)| rest.to_string());
    assert_eq!(strip(&vfh[0]), strip(&vfh[2]));
    assert_eq!(strip(&esf[0]), strip(&esf[1]));

    let centered = read_blocks(out.join("cubeCentered"));
    let filtered = read_blocks(out.join("cubeFiltered"));
    assert_eq!(centered.len(), 3);
    assert_eq!(filtered.len(), 3);

    for ((elapsed, points), (filtered_elapsed, filtered_points)) in centered.iter().zip(&filtered) {
        assert_eq!(elapsed, filtered_elapsed);
        assert!(!points.is_empty() && points.len() <= 1000);
        assert_eq!(points.len(), filtered_points.len());

        let n = points.len() as f32;
        let mean = points.iter().fold(Point3f::origin(), |acc, p| acc + p.coords / n);
        assert_relative_eq!(mean.coords.norm(), 0.0, epsilon = 1e-4);

        let shift = filtered_points[0] - points[0];
        for (c, f) in points.iter().zip(filtered_points) {
            assert_relative_eq!(f - c, shift, epsilon = 1e-5);
        }
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_permissive_outlier_filter_keeps_every_point() {
    let dir = workspace("permissive");
    write_session(&dir, "grid");

    let pipeline = PipelineConfig {
        outlier_std_mul: 10.0,
        esf_sample_size: 2000,
        ..PipelineConfig::default()
    };
    extract_session("grid", &dir.join("calibration.txt"), &config(&dir), pipeline, &mut NoopObserver).unwrap();

    let blocks = read_blocks(dir.join("out").join("gridCentered"));
    assert_eq!(blocks.len(), 3);
    for (_, points) in &blocks {
        assert_eq!(points.len(), 1000);
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_observer_sees_every_frame() {
    struct Counter(Vec<(usize, usize)>);

    impl FrameObserver for Counter {
        fn on_frame(&mut self, index: usize, _elapsed: f64, centered: &PointCloud<Point3f>) {
            self.0.push((index, centered.len()));
        }
    }

    let dir = workspace("observer");
    write_session(&dir, "obs");

    let mut counter = Counter(Vec::new());
    let pipeline = PipelineConfig {
        esf_sample_size: 1000,
        ..PipelineConfig::default()
    };
    extract_session("obs", &dir.join("calibration.txt"), &config(&dir), pipeline, &mut counter).unwrap();

    let indices: Vec<usize> = counter.0.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert!(counter.0.iter().all(|&(_, len)| len > 0));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn test_missing_inputs_leave_outputs_alone() {
    let dir = workspace("missing");
    fs::write(dir.join("calibration.txt"), IDENTITY).unwrap();
    let previous = dir.join("out").join("goneVFH");
    fs::write(&previous, "0,1\n").unwrap();

    let result = extract_session(
        "gone",
        &dir.join("calibration.txt"),
        &config(&dir),
        PipelineConfig::default(),
        &mut NoopObserver,
    );
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&previous).unwrap(), "0,1\n");

    let result = extract_session(
        "gone",
        &dir.join("no_calibration.txt"),
        &config(&dir),
        PipelineConfig::default(),
        &mut NoopObserver,
    );
    assert!(result.is_err());

    let _ = fs::remove_dir_all(&dir);
}
