//! Volume frames and movies through external programs.
//!
//! ChimeraX renders one frame per iteration (all class volumes tiled side by
//! side); ffmpeg stitches the frames into a movie. Neither is required: a
//! missing tool or a failed run is logged and the report carries on.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::data::collate::IterationVolumes;
use crate::error::ExternalToolError;

/// Frame files are `frame_0000.png`, `frame_0001.png`, ...
pub const FRAME_PREFIX: &str = "frame_";

/// Presentation settings for every render call. Built once from the command
/// line and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Full lighting with ambient occlusion and shadows.
    pub raytrace: bool,
    /// Flat lighting; wins over `raytrace`.
    pub flat: bool,
    /// 1920×1080 instead of 960×540.
    pub high_res: bool,
    /// ChimeraX commands replacing the default surface presentation.
    pub visual: Option<String>,
    /// Extra options appended to the `save` command.
    pub save: Option<String>,
}

impl RenderConfig {
    pub fn image_size(&self) -> (u32, u32) {
        if self.high_res {
            (1920, 1080)
        } else {
            (960, 540)
        }
    }

    pub fn lighting(&self) -> &'static str {
        if self.flat {
            "flat"
        } else if self.raytrace {
            "full"
        } else {
            "soft"
        }
    }
}

/// One frame to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub ordinal: usize,
    pub iteration: u32,
    pub volumes: Vec<PathBuf>,
    pub output: PathBuf,
}

pub fn frame_file_name(ordinal: usize) -> String {
    format!("{FRAME_PREFIX}{ordinal:04}.png")
}

/// One frame per iteration group, numbered in iteration order.
pub fn frame_specs(groups: &[IterationVolumes], out_dir: &Path) -> Vec<FrameSpec> {
    groups
        .iter()
        .enumerate()
        .map(|(ordinal, group)| FrameSpec {
            ordinal,
            iteration: group.iteration,
            volumes: group.volumes.clone(),
            output: out_dir.join(frame_file_name(ordinal)),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Renderer seam
// ---------------------------------------------------------------------------

/// Something that turns a frame description into an image file.
pub trait Renderer {
    fn render(&self, frame: &FrameSpec, config: &RenderConfig) -> Result<PathBuf, ExternalToolError>;
}

/// Render every frame; failures are logged and skipped. Returns the frames
/// that were written.
pub fn render_frames(
    renderer: &dyn Renderer,
    frames: &[FrameSpec],
    config: &RenderConfig,
) -> Vec<PathBuf> {
    let mut written = Vec::with_capacity(frames.len());
    for frame in frames {
        match renderer.render(frame, config) {
            Ok(path) => {
                log::info!("iteration {} → {}", frame.iteration, path.display());
                written.push(path);
            }
            Err(e) => log::warn!("frame {} (iteration {}): {e}", frame.ordinal, frame.iteration),
        }
    }
    written
}

// ---------------------------------------------------------------------------
// ChimeraX
// ---------------------------------------------------------------------------

/// Check if ChimeraX is installed and return path
pub fn find_chimerax() -> Option<PathBuf> {
    for name in &["chimerax", "ChimeraX"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    let common_paths = [
        "/usr/bin/chimerax",
        "/usr/local/bin/chimerax",
        "/opt/UCSF/ChimeraX/bin/ChimeraX",
        "/Applications/ChimeraX.app/Contents/MacOS/ChimeraX",
    ];
    common_paths
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Headless ChimeraX driven by a generated `.cxc` command script.
pub struct ChimeraX {
    executable: PathBuf,
}

impl ChimeraX {
    pub fn locate() -> Result<Self, ExternalToolError> {
        find_chimerax()
            .map(|executable| Self { executable })
            .ok_or(ExternalToolError::NotFound("ChimeraX"))
    }
}

impl Renderer for ChimeraX {
    fn render(&self, frame: &FrameSpec, config: &RenderConfig) -> Result<PathBuf, ExternalToolError> {
        let script_path = frame.output.with_extension("cxc");
        fs::write(&script_path, chimerax_script(frame, config)).map_err(|source| {
            ExternalToolError::Script {
                path: script_path.clone(),
                source,
            }
        })?;

        let status = Command::new(&self.executable)
            .args(["--nogui", "--offscreen", "--cmd"])
            .arg(format!("open \"{}\"", script_path.display()))
            .status()
            .map_err(|source| ExternalToolError::Spawn {
                tool: "ChimeraX",
                source,
            })?;

        if !status.success() {
            return Err(ExternalToolError::ExitStatus {
                tool: "ChimeraX",
                status,
            });
        }
        if !frame.output.exists() {
            return Err(ExternalToolError::MissingOutput {
                tool: "ChimeraX",
                path: frame.output.clone(),
            });
        }
        Ok(frame.output.clone())
    }
}

/// Command script for one frame.
pub fn chimerax_script(frame: &FrameSpec, config: &RenderConfig) -> String {
    let mut script = String::new();
    script.push_str(&format!("# iteration {}\n", frame.iteration));

    let volumes: Vec<String> = frame
        .volumes
        .iter()
        .map(|v| format!("\"{}\"", v.display()))
        .collect();
    script.push_str(&format!("open {}\n", volumes.join(" ")));

    match &config.visual {
        Some(visual) => {
            script.push_str(visual);
            script.push('\n');
        }
        None => script.push_str("volume all style surface step 1\n"),
    }
    script.push_str("set bgColor white\n");
    script.push_str("tile\n");
    script.push_str("view\n");
    script.push_str(&format!("lighting {}\n", config.lighting()));
    if config.flat {
        script.push_str("graphics silhouettes true\n");
    }
    script.push_str(&format!(
        "2dlabels text \"Iteration {}\" xpos 0.03 ypos 0.92 size 24 color black\n",
        frame.iteration
    ));

    let (w, h) = config.image_size();
    let mut save = format!(
        "save \"{}\" width {w} height {h} supersample 3",
        frame.output.display()
    );
    if let Some(extra) = &config.save {
        save.push(' ');
        save.push_str(extra);
    }
    script.push_str(&save);
    script.push('\n');

    script.push_str("close session\nexit\n");
    script
}

// ---------------------------------------------------------------------------
// ffmpeg
// ---------------------------------------------------------------------------

pub struct MovieEncoder {
    executable: PathBuf,
}

impl MovieEncoder {
    pub fn locate() -> Result<Self, ExternalToolError> {
        which::which("ffmpeg")
            .map(|executable| Self { executable })
            .map_err(|_| ExternalToolError::NotFound("ffmpeg"))
    }

    /// Encode `frame_%04d.png` from `frames_dir` into `output`.
    pub fn encode(&self, frames_dir: &Path, output: &Path, fps: u32) -> Result<(), ExternalToolError> {
        let status = Command::new(&self.executable)
            .args(encoder_args(frames_dir, output, fps))
            .status()
            .map_err(|source| ExternalToolError::Spawn {
                tool: "ffmpeg",
                source,
            })?;
        if !status.success() {
            return Err(ExternalToolError::ExitStatus {
                tool: "ffmpeg",
                status,
            });
        }
        if !output.exists() {
            return Err(ExternalToolError::MissingOutput {
                tool: "ffmpeg",
                path: output.to_path_buf(),
            });
        }
        log::info!("wrote {}", output.display());
        Ok(())
    }
}

pub fn encoder_args(frames_dir: &Path, output: &Path, fps: u32) -> Vec<String> {
    let input = frames_dir.join(format!("{FRAME_PREFIX}%04d.png"));
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-framerate".into(),
        fps.to_string(),
        "-start_number".into(),
        "0".into(),
        "-i".into(),
        input.display().to_string(),
        // yuv420p needs even dimensions.
        "-vf".into(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        output.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn frame() -> FrameSpec {
        FrameSpec {
            ordinal: 3,
            iteration: 25,
            volumes: vec![
                PathBuf::from("/job/run_it025_class001.mrc"),
                PathBuf::from("/job/run_it025_class002.mrc"),
            ],
            output: PathBuf::from("/out/frame_0003.png"),
        }
    }

    #[test]
    fn frame_names_are_zero_padded() {
        assert_eq!(frame_file_name(0), "frame_0000.png");
        assert_eq!(frame_file_name(42), "frame_0042.png");
        assert_eq!(frame_file_name(12345), "frame_12345.png");
    }

    #[test]
    fn specs_follow_group_order() {
        let groups = vec![
            IterationVolumes {
                iteration: 1,
                volumes: vec![PathBuf::from("a.mrc")],
            },
            IterationVolumes {
                iteration: 4,
                volumes: vec![PathBuf::from("b.mrc")],
            },
        ];
        let specs = frame_specs(&groups, Path::new("/out"));
        assert_eq!(specs[1].ordinal, 1);
        assert_eq!(specs[1].iteration, 4);
        assert_eq!(specs[1].output, PathBuf::from("/out/frame_0001.png"));
    }

    #[test]
    fn default_script() {
        let script = chimerax_script(&frame(), &RenderConfig::default());
        assert!(script.contains(
            "open \"/job/run_it025_class001.mrc\" \"/job/run_it025_class002.mrc\""
        ));
        assert!(script.contains("volume all style surface"));
        assert!(script.contains("lighting soft"));
        assert!(script.contains("Iteration 25"));
        assert!(script.contains("save \"/out/frame_0003.png\" width 960 height 540 supersample 3\n"));
        assert!(script.ends_with("exit\n"));
    }

    #[test]
    fn config_changes_script() {
        let config = RenderConfig {
            raytrace: true,
            flat: false,
            high_res: true,
            visual: Some("volume #1-2 level 0.02 color gold".into()),
            save: Some("transparentBackground true".into()),
        };
        let script = chimerax_script(&frame(), &config);
        assert!(script.contains("volume #1-2 level 0.02 color gold\n"));
        assert!(!script.contains("style surface"));
        assert!(script.contains("lighting full"));
        assert!(script.contains("width 1920 height 1080 supersample 3 transparentBackground true"));

        let flat = RenderConfig {
            flat: true,
            raytrace: true,
            ..RenderConfig::default()
        };
        assert_eq!(flat.lighting(), "flat");
    }

    struct FakeRenderer {
        fail_on: u32,
        calls: RefCell<Vec<u32>>,
    }

    impl Renderer for FakeRenderer {
        fn render(&self, frame: &FrameSpec, _: &RenderConfig) -> Result<PathBuf, ExternalToolError> {
            self.calls.borrow_mut().push(frame.iteration);
            if frame.iteration == self.fail_on {
                Err(ExternalToolError::NotFound("ChimeraX"))
            } else {
                Ok(frame.output.clone())
            }
        }
    }

    #[test]
    fn failed_frames_are_skipped() {
        let groups: Vec<IterationVolumes> = (1..=3)
            .map(|iteration| IterationVolumes {
                iteration,
                volumes: vec![],
            })
            .collect();
        let specs = frame_specs(&groups, Path::new("/out"));
        let renderer = FakeRenderer {
            fail_on: 2,
            calls: RefCell::new(Vec::new()),
        };
        let written = render_frames(&renderer, &specs, &RenderConfig::default());
        assert_eq!(*renderer.calls.borrow(), vec![1, 2, 3]);
        assert_eq!(
            written,
            vec![PathBuf::from("/out/frame_0000.png"), PathBuf::from("/out/frame_0002.png")]
        );
    }

    #[test]
    fn ffmpeg_arguments() {
        let args = encoder_args(Path::new("/out/frames"), Path::new("/out/job.mp4"), 4);
        assert!(args.windows(2).any(|w| w == ["-framerate", "4"]));
        assert!(args.contains(&"/out/frames/frame_%04d.png".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/out/job.mp4"));
    }
}
