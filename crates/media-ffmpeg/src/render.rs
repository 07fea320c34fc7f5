use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::error::{MediaFfmpegError, Result};
use crate::progress::parse_progress_line;
use crate::time::micros_to_nanos;

const STDERR_TAIL_LINES: usize = 32;

/// How the clips are turned into the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Decode every input and encode through a concat filter graph.
    Reencode,
    /// Join inputs with the concat demuxer without touching the packets.
    StreamCopy,
}

/// Request payload for one render run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub inputs: Vec<PathBuf>,
    pub output_path: PathBuf,
    /// FFmpeg muxer name, e.g. `mp4`.
    pub container: String,
    /// FFmpeg video encoder name, e.g. `mpeg4`.
    pub video_codec: String,
    /// FFmpeg audio encoder name; `None` renders without audio.
    pub audio_codec: Option<String>,
    /// Fixed `-q:v` quantizer for the video encoder.
    pub video_quality: Option<u8>,
    pub audio_bitrate_kbps: Option<u32>,
    pub strategy: RenderStrategy,
}

impl RenderRequest {
    /// Path of the concat demuxer playlist written next to the output.
    pub fn concat_list_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_owned();
        name.push(".ffconcat");
        PathBuf::from(name)
    }
}

/// Final state of a render process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Finished,
    Failed { status: Option<i32>, stderr: String },
    Cancelled,
}

/// Handle to a running `ffmpeg` render.
///
/// The process is supervised by a helper thread that tracks the output
/// position and reports the outcome once through the exit callback.
#[derive(Debug)]
pub struct RenderProcess {
    child: Arc<Mutex<Child>>,
    position_nanos: Arc<AtomicU64>,
    cancelled: Arc<AtomicBool>,
    supervisor: Option<JoinHandle<()>>,
}

impl RenderProcess {
    /// Last output timestamp reported by `ffmpeg`, in nanoseconds.
    pub fn position_nanos(&self) -> u64 {
        self.position_nanos.load(Ordering::Relaxed)
    }

    /// Returns true once the process exited and the outcome was reported.
    pub fn is_finished(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_none_or(|supervisor| supervisor.is_finished())
    }

    /// Kills the process. The exit callback receives `RenderOutcome::Cancelled`.
    pub fn kill(&mut self) -> Result<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        {
            let mut child = lock_child(&self.child);
            match child.kill() {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::InvalidInput => {}
                Err(source) => {
                    return Err(MediaFfmpegError::Io {
                        context: "kill ffmpeg render",
                        source,
                    });
                }
            }
        }
        if let Some(supervisor) = self.supervisor.take() {
            if supervisor.join().is_err() {
                warn!("render supervisor thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for RenderProcess {
    fn drop(&mut self) {
        if !self.is_finished() {
            if let Err(error) = self.kill() {
                warn!(%error, "failed to stop render on drop");
            }
        }
    }
}

/// Spawns `ffmpeg` for `request` and returns immediately.
///
/// `on_exit` runs on the supervisor thread after the process exited.
pub fn spawn_render<F>(request: &RenderRequest, on_exit: F) -> Result<RenderProcess>
where
    F: FnOnce(RenderOutcome) + Send + 'static,
{
    spawn_render_with(OsStr::new("ffmpeg"), request, on_exit)
}

fn spawn_render_with<F>(program: &OsStr, request: &RenderRequest, on_exit: F) -> Result<RenderProcess>
where
    F: FnOnce(RenderOutcome) + Send + 'static,
{
    validate_request(request)?;

    let concat_list = match request.strategy {
        RenderStrategy::StreamCopy => Some(ConcatList::write(request)?),
        RenderStrategy::Reencode => None,
    };
    let args = build_render_args(request, concat_list.as_ref().map(ConcatList::path));
    debug!(?program, ?args, "spawning ffmpeg render");

    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| MediaFfmpegError::Io {
            context: "spawn ffmpeg render",
            source,
        })?;
    let stdout = child.stdout.take().ok_or_else(|| MediaFfmpegError::Io {
        context: "capture ffmpeg stdout",
        source: std::io::Error::other("stdout is not piped"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| MediaFfmpegError::Io {
        context: "capture ffmpeg stderr",
        source: std::io::Error::other("stderr is not piped"),
    })?;

    info!(
        output = %request.output_path.display(),
        inputs = request.inputs.len(),
        strategy = ?request.strategy,
        "render started"
    );

    let child = Arc::new(Mutex::new(child));
    let position_nanos = Arc::new(AtomicU64::new(0));
    let cancelled = Arc::new(AtomicBool::new(false));

    let supervisor = {
        let child = Arc::clone(&child);
        let position_nanos = Arc::clone(&position_nanos);
        let cancelled = Arc::clone(&cancelled);
        thread::spawn(move || {
            let stderr_reader = thread::spawn(move || stderr_tail(stderr));

            for line in BufReader::new(stdout).lines().map_while(std::io::Result::ok) {
                if let Some(micros) = parse_progress_line(&line) {
                    if let Some(nanos) = micros_to_nanos(micros) {
                        position_nanos.store(nanos, Ordering::Relaxed);
                    }
                }
            }

            let stderr = stderr_reader.join().unwrap_or_default();
            let status = lock_child(&child).wait();
            drop(concat_list);

            let outcome = if cancelled.load(Ordering::SeqCst) {
                RenderOutcome::Cancelled
            } else {
                match status {
                    Ok(status) if status.success() => RenderOutcome::Finished,
                    Ok(status) => RenderOutcome::Failed {
                        status: status.code(),
                        stderr,
                    },
                    Err(error) => RenderOutcome::Failed {
                        status: None,
                        stderr: format!("wait for ffmpeg: {error}"),
                    },
                }
            };
            debug!(?outcome, "render process exited");
            on_exit(outcome);
        })
    };

    Ok(RenderProcess {
        child,
        position_nanos,
        cancelled,
        supervisor: Some(supervisor),
    })
}

/// Builds the `ffmpeg` argument list for `request`.
///
/// `concat_list` must point at the playlist written for stream copy renders.
pub fn build_render_args(request: &RenderRequest, concat_list: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-nostats",
        "-v",
        "error",
        "-y",
        "-progress",
        "pipe:1",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    let has_audio = request.audio_codec.is_some();

    match (request.strategy, concat_list) {
        (RenderStrategy::StreamCopy, Some(list)) => {
            args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
            args.push(list.as_os_str().to_owned());
            args.extend(["-map", "0:v:0"].map(OsString::from));
            if has_audio {
                args.extend(["-map", "0:a:0"].map(OsString::from));
            } else {
                args.push("-an".into());
            }
            args.extend(["-c", "copy"].map(OsString::from));
        }
        _ => {
            for input in &request.inputs {
                args.push("-i".into());
                args.push(input.as_os_str().to_owned());
            }
            if request.inputs.len() > 1 {
                args.push("-filter_complex".into());
                args.push(build_concat_filter(request.inputs.len(), has_audio).into());
                args.extend(["-map", "[vout]"].map(OsString::from));
                if has_audio {
                    args.extend(["-map", "[aout]"].map(OsString::from));
                }
            } else {
                args.extend(["-map", "0:v:0"].map(OsString::from));
                if has_audio {
                    args.extend(["-map", "0:a:0"].map(OsString::from));
                }
            }

            args.extend(["-c:v", request.video_codec.as_str()].map(OsString::from));
            if let Some(quality) = request.video_quality {
                args.push("-q:v".into());
                args.push(quality.to_string().into());
            }
            match request.audio_codec.as_deref() {
                Some(codec) => {
                    args.extend(["-c:a", codec].map(OsString::from));
                    if let Some(kbps) = request.audio_bitrate_kbps {
                        args.push("-b:a".into());
                        args.push(format!("{kbps}k").into());
                    }
                }
                None => args.push("-an".into()),
            }
        }
    }

    args.extend(["-f", request.container.as_str()].map(OsString::from));
    args.push(request.output_path.as_os_str().to_owned());
    args
}

fn build_concat_filter(inputs: usize, has_audio: bool) -> String {
    let mut filter = String::new();
    for index in 0..inputs {
        filter.push_str(&format!("[{index}:v:0]"));
        if has_audio {
            filter.push_str(&format!("[{index}:a:0]"));
        }
    }
    if has_audio {
        filter.push_str(&format!("concat=n={inputs}:v=1:a=1[vout][aout]"));
    } else {
        filter.push_str(&format!("concat=n={inputs}:v=1:a=0[vout]"));
    }
    filter
}

/// Concat demuxer playlist, removed when dropped.
#[derive(Debug)]
struct ConcatList {
    path: PathBuf,
}

impl ConcatList {
    fn write(request: &RenderRequest) -> Result<Self> {
        let mut playlist = String::from("ffconcat version 1.0\n");
        for input in &request.inputs {
            let escaped = input.to_string_lossy().replace('\'', r"'\''");
            playlist.push_str(&format!("file '{escaped}'\n"));
        }

        let path = request.concat_list_path();
        fs::write(&path, playlist).map_err(|source| MediaFfmpegError::Io {
            context: "write concat playlist",
            source,
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConcatList {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), %error, "failed to remove concat playlist");
            }
        }
    }
}

fn validate_request(request: &RenderRequest) -> Result<()> {
    if request.inputs.is_empty() {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "render inputs are empty",
        });
    }
    if request.container.is_empty() {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "container format is empty",
        });
    }
    if request.video_codec.is_empty() {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "video codec is empty",
        });
    }
    if request.inputs.iter().any(|input| *input == request.output_path) {
        return Err(MediaFfmpegError::InvalidRenderRequest {
            reason: "output path overwrites an input",
        });
    }
    Ok(())
}

fn stderr_tail(stderr: impl Read) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    for line in BufReader::new(stderr).lines().map_while(std::io::Result::ok) {
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;

    use super::{
        ConcatList, RenderRequest, RenderStrategy, build_concat_filter, build_render_args,
        spawn_render_with, stderr_tail, validate_request,
    };
    use crate::MediaFfmpegError;

    fn request(inputs: &[&str], strategy: RenderStrategy) -> RenderRequest {
        RenderRequest {
            inputs: inputs.iter().map(PathBuf::from).collect(),
            output_path: PathBuf::from("/movies/20240102-030405.mp4"),
            container: "mp4".to_string(),
            video_codec: "mpeg4".to_string(),
            audio_codec: Some("aac".to_string()),
            video_quality: Some(3),
            audio_bitrate_kbps: Some(128),
            strategy,
        }
    }

    fn joined(args: &[OsString]) -> String {
        args.iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn reencode_of_two_clips_concatenates_video_and_audio() {
        let args = build_render_args(&request(&["a.mp4", "b.mp4"], RenderStrategy::Reencode), None);

        assert_eq!(
            joined(&args),
            "-hide_banner -nostats -v error -y -progress pipe:1 -i a.mp4 -i b.mp4 \
-filter_complex [0:v:0][0:a:0][1:v:0][1:a:0]concat=n=2:v=1:a=1[vout][aout] \
-map [vout] -map [aout] -c:v mpeg4 -q:v 3 -c:a aac -b:a 128k -f mp4 /movies/20240102-030405.mp4"
        );
    }

    #[test]
    fn reencode_of_single_clip_maps_streams_directly() {
        let args = joined(&build_render_args(
            &request(&["a.mp4"], RenderStrategy::Reencode),
            None,
        ));

        assert!(args.contains("-i a.mp4 -map 0:v:0 -map 0:a:0 -c:v mpeg4"));
        assert!(!args.contains("-filter_complex"));
    }

    #[test]
    fn stream_copy_reads_playlist_and_copies_packets() {
        let req = request(&["a.mp4", "b.mp4"], RenderStrategy::StreamCopy);
        let list = req.concat_list_path();

        let args = joined(&build_render_args(&req, Some(&list)));

        assert!(args.contains(
            "-f concat -safe 0 -i /movies/20240102-030405.mp4.ffconcat -map 0:v:0 -map 0:a:0 -c copy"
        ));
        assert!(!args.contains("-c:v"));
    }

    #[test]
    fn missing_audio_codec_drops_audio() {
        let mut req = request(&["a.mp4", "b.mp4"], RenderStrategy::Reencode);
        req.audio_codec = None;

        let args = joined(&build_render_args(&req, None));

        assert!(args.contains("concat=n=2:v=1:a=0[vout]"));
        assert!(args.contains("-an"));
        assert_eq!(build_concat_filter(1, false), "[0:v:0]concat=n=1:v=1:a=0[vout]");
    }

    #[test]
    fn validate_rejects_output_that_overwrites_input() {
        let mut req = request(&["a.mp4"], RenderStrategy::Reencode);
        req.output_path = PathBuf::from("a.mp4");

        assert!(matches!(
            validate_request(&req),
            Err(MediaFfmpegError::InvalidRenderRequest {
                reason: "output path overwrites an input"
            })
        ));
    }

    #[test]
    fn stderr_tail_keeps_last_lines_only() {
        let text = (0..40).map(|n| format!("line {n}\n")).collect::<String>();

        let tail = stderr_tail(text.as_bytes());

        assert!(tail.starts_with("line 8\n"));
        assert!(tail.ends_with("line 39"));
    }

    #[test]
    fn concat_list_is_removed_when_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut req = request(&["/media/a.mp4", "/media/it's.mp4"], RenderStrategy::StreamCopy);
        req.output_path = dir.path().join("render.mp4");

        let list = ConcatList::write(&req).expect("write playlist");
        let text = std::fs::read_to_string(list.path()).expect("read playlist");
        assert_eq!(
            text,
            "ffconcat version 1.0\nfile '/media/a.mp4'\nfile '/media/it'\\''s.mp4'\n"
        );

        drop(list);
        assert!(!req.concat_list_path().exists());
    }

    #[test]
    fn failed_spawn_leaves_no_playlist_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut req = request(&["/media/a.mp4", "/media/b.mp4"], RenderStrategy::StreamCopy);
        req.output_path = dir.path().join("render.mp4");

        let result = spawn_render_with(
            std::ffi::OsStr::new("reel-ffmpeg-that-does-not-exist"),
            &req,
            |_| {},
        );

        assert!(matches!(
            result,
            Err(MediaFfmpegError::Io {
                context: "spawn ffmpeg render",
                ..
            })
        ));
        assert!(!req.concat_list_path().exists());
    }
}
