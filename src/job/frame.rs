//! Per-frame writing.

use tracing::{debug, error, info, info_span};

use super::WriteJob;
use crate::chaser::ChaserContext;
use crate::sdf::TimeCode;
use crate::util::{Error, Result};
use crate::writer::WriterContext;

impl WriteJob<'_> {
    /// Write every requested time sample, in order.
    ///
    /// The host time is moved to each sample and put back afterwards. An
    /// interrupt request is honoured after the frame in flight completes.
    pub(super) fn write_frames(&mut self) -> Result<()> {
        if self.ctx.args.time_samples.is_empty() {
            return Ok(());
        }
        let _span = info_span!("write_frames", samples = self.ctx.args.time_samples.len()).entered();
        let scene = self.ctx.scene;
        let previous = scene.current_time();

        let samples = self.ctx.args.time_samples.clone();
        let mut result = Ok(());
        for time in samples {
            scene.set_current_time(time);
            if let Err(e) = self.write_frame(time) {
                result = Err(e);
                break;
            }
            self.frames_written.push(time);
            if self.callbacks.is_interrupt_requested() {
                info!("Export interrupted after frame {}", time);
                break;
            }
        }

        scene.set_current_time(previous);
        result
    }

    /// Write one time sample: writers, then chasers, then the host callback.
    pub(super) fn write_frame(&mut self, time: f64) -> Result<()> {
        debug!("Writing frame {}", time);
        let scene = self.ctx.scene;
        let args = &self.ctx.args;
        if args.verbose {
            info!("{}", time);
        }
        let stage = self
            .ctx
            .stage
            .as_mut()
            .ok_or_else(|| Error::other("No stage is open"))?;

        let mut wctx = WriterContext { stage, scene, args };
        for writer in &mut self.ctx.writers {
            if wctx.stage.has_prim(writer.usd_path()) {
                writer.write(TimeCode::Time(time), &mut wctx)?;
            }
        }

        let mut cctx = ChaserContext {
            stage: wctx.stage,
            scene,
            args,
            dag_to_usd: &self.dag_to_usd,
        };
        for named in &mut self.chasers {
            if let Err(e) = named.chaser.export_frame(time, &mut cctx) {
                error!("Chaser {} failed at frame {}: {}", named.name, time, e);
                return Err(Error::ChaserFailed {
                    name: named.name.clone(),
                    hook: "export_frame",
                });
            }
        }

        self.callbacks.per_frame(time);
        Ok(())
    }
}
