//! Finder and linker working together on synthetic cubes.

use cubeseek_algorithms::{run_linker, run_scfind, LinkerConfig, ScFindConfig};
use cubeseek_core::{DataCube, NoiseStatistic};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Standard normal deviates via Box-Muller from a seeded generator.
struct NormalDeviates {
    rng: StdRng,
    spare: Option<f64>,
}

impl NormalDeviates {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spare: None,
        }
    }

    fn next(&mut self) -> f64 {
        if let Some(value) = self.spare.take() {
            return value;
        }
        let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = self.rng.gen_range(0.0..std::f64::consts::TAU);
        let radius = (-2.0 * u1.ln()).sqrt();
        self.spare = Some(radius * u2.sin());
        radius * u2.cos()
    }
}

#[test]
fn empty_cube_produces_no_sources() {
    let cube = DataCube::blank(4, 4, 4, -32).unwrap();
    let config = ScFindConfig::default()
        .with_kernels_xy(vec![0.0])
        .with_kernels_z(vec![0])
        .with_threshold(3.5);
    let mut mask = run_scfind(&cube, &config).unwrap();
    assert!(mask.data().as_i32().unwrap().iter().all(|&m| m == 0));

    let linker = LinkerConfig::default().with_min_size(1, 1, 1);
    let table = run_linker(&cube, &mut mask, &linker).unwrap();
    assert_eq!(table.source_count(), 0);
}

#[test]
fn single_bright_pixel_ends_as_label_one() {
    let mut cube = DataCube::blank(10, 10, 10, -32).unwrap();
    cube.set_flt(5, 5, 5, 100.0).unwrap();

    let config = ScFindConfig::default()
        .with_kernels_xy(vec![0.0])
        .with_kernels_z(vec![0])
        .with_threshold(3.0)
        .with_statistic(NoiseStatistic::Mad);
    let mut mask = run_scfind(&cube, &config).unwrap();

    let linker = LinkerConfig::default().with_min_size(1, 1, 1);
    let table = run_linker(&cube, &mut mask, &linker).unwrap();

    assert_eq!(table.source_count(), 1);
    assert_eq!(table.n_pix(0), 1);
    assert_eq!(table.bounding_box(0), (5, 5, 5, 5, 5, 5));
    assert_eq!(mask.get_int(5, 5, 5).unwrap(), 1);
}

#[test]
fn gaussian_blob_in_noise_is_recovered() {
    // A 64^3 cube of unit Gaussian noise plus a bright compact blob.
    let n = 64_usize;
    let mut cube = DataCube::blank(n, n, n, -32).unwrap();
    let mut deviates = NormalDeviates::new(0x5EED);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                cube.set_flt(x, y, z, deviates.next()).unwrap();
            }
        }
    }

    let centre = (n / 2) as f64;
    let sigma = 1.5_f64;
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let r2 = (x as f64 - centre).powi(2)
                    + (y as f64 - centre).powi(2)
                    + (z as f64 - centre).powi(2);
                let blob = 8.0 * (-r2 / (2.0 * sigma * sigma)).exp();
                if blob > 1.0e-3 {
                    let value = cube.get_flt(x, y, z).unwrap() + blob;
                    cube.set_flt(x, y, z, value).unwrap();
                }
            }
        }
    }

    let config = ScFindConfig::default()
        .with_kernels_xy(vec![0.0, 3.5])
        .with_kernels_z(vec![1, 3])
        .with_threshold(4.0)
        .with_replacement(0.0);
    let mut mask = run_scfind(&cube, &config).unwrap();

    // Merge generously and keep everything, then check the brightest
    // source covers the true centre.
    let linker = LinkerConfig::default()
        .with_radius(2, 2, 2)
        .with_min_size(1, 1, 1);
    let table = run_linker(&cube, &mut mask, &linker).unwrap();

    assert!(table.source_count() >= 1, "no sources recovered");
    let mut best = 0;
    for row in 0..table.source_count() {
        if table.f_sum(row) > table.f_sum(best) {
            best = row;
        }
    }
    let (x0, x1, y0, y1, z0, z1) = table.bounding_box(best);
    let mid = (n / 2) as u16;
    assert!(x0 <= mid && mid <= x1, "x box {x0}-{x1}");
    assert!(y0 <= mid && mid <= y1, "y box {y0}-{y1}");
    assert!(z0 <= mid && mid <= z1, "z box {z0}-{z1}");
    assert!(table.n_pix(best) >= 5, "n_pix = {}", table.n_pix(best));
}

#[test]
fn detected_mask_pixels_exceed_some_pass_threshold() {
    // Every masked pixel must be above the threshold in at least one of
    // the smoothing passes; with a single trivial kernel that reduces to
    // the unsmoothed cube itself.
    let n = 16_usize;
    let mut cube = DataCube::blank(n, n, n, -32).unwrap();
    let mut deviates = NormalDeviates::new(42);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                cube.set_flt(x, y, z, deviates.next()).unwrap();
            }
        }
    }

    let threshold = 3.0;
    let config = ScFindConfig::default()
        .with_kernels_xy(vec![0.0])
        .with_kernels_z(vec![0])
        .with_threshold(threshold);
    let mask = run_scfind(&cube, &config).unwrap();

    let rms = cube
        .noise_level(1, Default::default(), Default::default())
        .unwrap();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                if mask.get_int(x, y, z).unwrap() == 1 {
                    let value = cube.get_flt(x, y, z).unwrap().abs();
                    assert!(value > threshold * rms * 0.99);
                }
            }
        }
    }
}
