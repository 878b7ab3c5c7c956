//! Write a synthetic Class3D job directory for trying the report out.
//!
//! `generate_sample [DIR]` (default `sample_job`). Iterations 0..=12 come from
//! a fresh run, 13..=20 from a continuation (`run_ct12_it012...`).

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

const CLASSES: usize = 4;
const FRESH_ITERATIONS: u32 = 12;
const CONTINUED_ITERATIONS: u32 = 8;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Class populations drift from uniform towards these shares.
const FINAL_SHARES: [f64; CLASSES] = [0.46, 0.28, 0.18, 0.08];

fn model_star(stem: &str, progress: f64, rng: &mut SimpleRng) -> String {
    let mut shares: Vec<f64> = FINAL_SHARES
        .iter()
        .map(|&f| {
            let uniform = 1.0 / CLASSES as f64;
            (uniform + (f - uniform) * progress + rng.gauss(0.0, 0.01)).max(0.001)
        })
        .collect();
    let total: f64 = shares.iter().sum();
    shares.iter_mut().for_each(|s| *s /= total);

    let overall_res = 25.0 - 16.0 * progress;
    let mut s = String::new();
    let _ = write!(
        s,
        "\n# version 30001\n\ndata_model_general\n\n\
         _rlnReferenceDimensionality                        3\n\
         _rlnDataDimensionality                             2\n\
         _rlnOriginalImageSize                            256\n\
         _rlnCurrentResolution                     {overall_res:>10.6}\n\
         _rlnNrClasses                                     {CLASSES}\n\n\
         # version 30001\n\ndata_model_classes\n\nloop_\n\
         _rlnReferenceImage #1\n\
         _rlnClassDistribution #2\n\
         _rlnAccuracyRotations #3\n\
         _rlnAccuracyTranslationsAngst #4\n\
         _rlnEstimatedResolution #5\n\
         _rlnOverallFourierCompleteness #6\n"
    );
    for (class, share) in shares.iter().enumerate() {
        let res = overall_res + 4.0 * class as f64 * (1.0 - share) + rng.gauss(0.0, 0.2);
        let rot = (12.0 - 9.0 * progress + rng.gauss(0.0, 0.3)).max(0.5);
        let trans = (4.0 - 3.0 * progress + rng.gauss(0.0, 0.1)).max(0.2);
        let _ = writeln!(
            s,
            "Class3D/job012/{stem}_class{:03}.mrc {share:>12.6} {rot:>12.6} {trans:>12.6} {res:>12.6} {:>12.6}",
            class + 1,
            (0.5 + 0.5 * progress).min(1.0),
        );
    }
    s.push('\n');
    s
}

const PIPELINE_STAR: &str = "
# version 30001

data_pipeline_general

_rlnPipeLineJobCounter                       13

# version 30001

data_pipeline_processes

loop_
_rlnPipeLineProcessName #1
_rlnPipeLineProcessAlias #2
_rlnPipeLineProcessTypeLabel #3
_rlnPipeLineProcessStatusLabel #4
Class3D/job012/       None relion.class3d  Succeeded
";

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
}

fn main() -> Result<()> {
    let dir = std::env::args().nth(1).unwrap_or_else(|| "sample_job".to_string());
    let dir = Path::new(&dir);
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    write(dir, "job_pipeline.star", PIPELINE_STAR)?;
    write(dir, "run.job", &format!("is_continue == false\nNumber of classes: == {CLASSES}\n"))?;

    let total = (FRESH_ITERATIONS + CONTINUED_ITERATIONS) as f64;
    let mut files = 0;
    for it in 0..=FRESH_ITERATIONS {
        let stem = format!("run_it{it:03}");
        let progress = it as f64 / total;
        write(dir, &format!("{stem}_model.star"), &model_star(&stem, progress, &mut rng))?;
        files += 1;
    }
    // Continuation from it012: logical iterations 13..=20.
    for it in FRESH_ITERATIONS..FRESH_ITERATIONS + CONTINUED_ITERATIONS {
        let stem = format!("run_ct{FRESH_ITERATIONS}_it{it:03}");
        let progress = (it + 1) as f64 / total;
        write(dir, &format!("{stem}_model.star"), &model_star(&stem, progress, &mut rng))?;
        files += 1;
    }

    println!("Wrote {files} model.star files ({CLASSES} classes) to {}", dir.display());
    Ok(())
}
