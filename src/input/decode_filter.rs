/// FFmpeg解码过滤器模块
/// FFmpeg decode filter module
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;

const MAX_DIMENSION: u32 = 8192;

/// 解码线程 → 检测线程
#[derive(Debug)]
pub enum DecodeEvent {
    Frame(RgbImage),
    /// 输入源打开或解码失败
    Failed(String),
    /// 输入结束
    End,
}

/// FFmpeg解码过滤器: YUV420P → RGB 帧
pub struct DecodeFilter {
    tx: Sender<DecodeEvent>,
    stop: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    /// 实时源: 队列满时丢帧; 文件源: 阻塞等待
    live: bool,
    count: usize,
    last: Instant,
    pub total_frames: usize,
    pub dropped_frames: usize,
}

impl DecodeFilter {
    pub fn new(
        tx: Sender<DecodeEvent>,
        stop: Arc<AtomicBool>,
        cancel: Arc<AtomicBool>,
        live: bool,
    ) -> Self {
        Self {
            tx,
            stop,
            cancel,
            live,
            count: 0,
            last: Instant::now(),
            total_frames: 0,
            dropped_frames: 0,
        }
    }

    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.cancel.load(Ordering::Relaxed)
    }

    fn push(&mut self, image: RgbImage) -> Result<(), String> {
        if self.live {
            match self.tx.try_send(DecodeEvent::Frame(image)) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped_frames += 1;
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err("Receiver closed".to_string()),
            }
        } else {
            self.tx
                .send(DecodeEvent::Frame(image))
                .map_err(|_| "Receiver closed".to_string())
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::info!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        if self.should_stop() {
            return Err("Decoder stopped".to_string());
        }

        self.total_frames += 1;

        let image = unsafe {
            // 基本检查：空帧或损坏帧
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                self.dropped_frames += 1;
                log::warn!("⚠️ 丢弃帧 #{}: 非法分辨率 {}x{}", self.total_frames, w, h);
                return Ok(None);
            }

            // YUV420P数据指针
            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize).div_ceil(2) {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut buffer = vec![0u8; (w * h * 3) as usize];
            yuv420p_to_rgb(
                y_plane,
                u_plane,
                v_plane,
                y_stride,
                uv_stride,
                &mut buffer,
                w as usize,
                h as usize,
            );
            RgbImage::from_raw(w, h, buffer)
        };

        let Some(image) = image else {
            self.dropped_frames += 1;
            return Ok(None);
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 5.0 {
            let elapsed = self.last.elapsed().as_secs_f64();
            log::debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        self.push(image)?;
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::info!(
            "✅ 解码线程退出 (总帧{}, 丢弃{})",
            self.total_frames,
            self.dropped_frames
        );
    }
}

/// YUV420P → RGB24 (BT.601, 定点运算)
///
/// # Safety
/// 三个平面指针必须覆盖 `height` 行 (色度平面为 `(height + 1) / 2` 行), 步长如参数所示.
#[inline]
#[allow(clippy::too_many_arguments)]
pub unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(y: u8, u: u8, v: u8) -> [u8; 3] {
        // 2x2 帧, 色度 1x1
        let y_plane = [y; 4];
        let u_plane = [u];
        let v_plane = [v];
        let mut out = [0u8; 12];
        unsafe {
            yuv420p_to_rgb(
                y_plane.as_ptr(),
                u_plane.as_ptr(),
                v_plane.as_ptr(),
                2,
                1,
                &mut out,
                2,
                2,
            );
        }
        [out[9], out[10], out[11]]
    }

    #[test]
    fn neutral_chroma_is_gray() {
        assert_eq!(convert(128, 128, 128), [128, 128, 128]);
        assert_eq!(convert(0, 128, 128), [0, 0, 0]);
    }

    #[test]
    fn strong_v_is_red() {
        let [r, g, b] = convert(76, 84, 255);
        assert!(r > 240);
        assert!(g < 20);
        assert!(b < 20);
    }

    fn filter(capacity: usize, live: bool) -> (DecodeFilter, crossbeam_channel::Receiver<DecodeEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        (DecodeFilter::new(tx, stop, cancel, live), rx)
    }

    #[test]
    fn live_source_drops_when_queue_full() {
        let (mut f, rx) = filter(1, true);
        assert_eq!(f.push(RgbImage::new(2, 2)), Ok(()));
        assert_eq!(f.push(RgbImage::new(2, 2)), Ok(()));
        assert_eq!(f.push(RgbImage::new(2, 2)), Ok(()));
        assert_eq!(f.dropped_frames, 2);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn file_source_waits_for_receiver() {
        let (mut f, rx) = filter(1, false);
        f.push(RgbImage::new(2, 2)).unwrap();

        let reader = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            let mut received = 0;
            while let Ok(DecodeEvent::Frame(_)) = rx.recv() {
                received += 1;
            }
            received
        });

        let started = Instant::now();
        f.push(RgbImage::new(2, 2)).unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_millis(40));
        assert_eq!(f.dropped_frames, 0);

        drop(f);
        assert_eq!(reader.join().unwrap(), 2);
    }

    #[test]
    fn closed_receiver_is_an_error() {
        for live in [true, false] {
            let (mut f, rx) = filter(1, live);
            drop(rx);
            assert_eq!(f.push(RgbImage::new(2, 2)), Err("Receiver closed".to_string()));
        }
    }
}
