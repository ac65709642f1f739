//! Per-frame compositing: bake static particles into the trail texture, then
//! layer background, trail and dynamic particles onto the visible target.

use crate::resources::{GpuResources, ParticleStreams, TextureLayer};

/// One step of the frame protocol, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// Draw pending static particles into the trail texture.
    BakeStatic {
        /// Number of points to draw.
        count: u32,
    },
    /// Open the visible pass. The clear to opaque black is the pass's load
    /// op, so this step has no draw of its own.
    ClearSurface,
    /// Opaque blit of the background image.
    BlitBackground,
    /// Alpha-blended, V-flipped blit of the trail texture.
    BlitTrail,
    /// Draw pending dynamic particles on top.
    DrawDynamic {
        /// Number of points to draw.
        count: u32,
    },
    /// Rewind both particle cursors. Runs after submission, whether or not
    /// the visible frame was acquired.
    ResetCursors,
    /// Present the visible frame, if one was acquired.
    Present,
}

/// Ordered steps for a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    steps: Vec<FrameStep>,
}

impl FramePlan {
    /// Build the plan for the given pending particle counts.
    pub fn build(static_count: u32, dynamic_count: u32, has_background: bool) -> Self {
        let mut steps = Vec::with_capacity(7);
        if static_count > 0 {
            steps.push(FrameStep::BakeStatic {
                count: static_count,
            });
        }
        steps.push(FrameStep::ClearSurface);
        if has_background {
            steps.push(FrameStep::BlitBackground);
        }
        steps.push(FrameStep::BlitTrail);
        if dynamic_count > 0 {
            steps.push(FrameStep::DrawDynamic {
                count: dynamic_count,
            });
        }
        steps.push(FrameStep::ResetCursors);
        steps.push(FrameStep::Present);
        Self { steps }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[FrameStep] {
        &self.steps
    }

    /// Static points to bake, if any.
    pub fn bake_count(&self) -> Option<u32> {
        self.steps.iter().find_map(|step| match *step {
            FrameStep::BakeStatic { count } => Some(count),
            _ => None,
        })
    }

    fn position(&self, wanted: impl Fn(&FrameStep) -> bool) -> Option<usize> {
        self.steps.iter().position(wanted)
    }

    /// Index of the trail blit.
    pub fn trail_index(&self) -> Option<usize> {
        self.position(|step| *step == FrameStep::BlitTrail)
    }
}

/// What a call to [`crate::Renderer::render`] actually drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Static points baked into the trail texture.
    pub static_points: u32,
    /// Dynamic points drawn on the surface.
    pub dynamic_points: u32,
    /// Draw calls issued across all passes.
    pub draw_calls: u32,
    /// The background layer was composited.
    pub background: bool,
    /// The trail layer was composited.
    pub trail: bool,
    /// Static particles dropped because the buffer was full.
    pub dropped_static: usize,
    /// Dynamic particles dropped because the buffer was full.
    pub dropped_dynamic: usize,
    /// The visible target was acquired and the frame submitted to it.
    pub presented: bool,
}

impl FrameStats {
    /// Total point primitives drawn this frame.
    pub fn points(&self) -> u32 {
        self.static_points + self.dynamic_points
    }
}

/// Encode the offscreen pass that bakes static particles into the trail.
pub fn encode_bake(
    encoder: &mut wgpu::CommandEncoder,
    res: &GpuResources,
    plan: &FramePlan,
    viewport: (u32, u32),
    stats: &mut FrameStats,
) {
    let Some(count) = plan.bake_count() else {
        return;
    };
    let Some(point) = res.programs.point.as_ref() else {
        return;
    };

    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Trail Bake Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &res.trail.view,
            resolve_target: None,
            ops: wgpu::Operations {
                // The trail accumulates across frames.
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        })],
        ..Default::default()
    });
    set_viewport(&mut pass, viewport);
    draw_points(
        &mut pass,
        point.offscreen(),
        &res.trail_points,
        &res.statics,
        count,
    );
    stats.static_points += count;
    stats.draw_calls += 1;
}

/// Encode the visible pass: clear, background, trail, dynamic particles.
pub fn encode_composite(
    encoder: &mut wgpu::CommandEncoder,
    target: &wgpu::TextureView,
    res: &GpuResources,
    plan: &FramePlan,
    viewport: (u32, u32),
    stats: &mut FrameStats,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Composite Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        ..Default::default()
    });
    set_viewport(&mut pass, viewport);

    for step in plan.steps() {
        match *step {
            FrameStep::BlitBackground => {
                if let Some(blit) = res.programs.blit.as_ref() {
                    draw_quad(&mut pass, blit.opaque(), &res.background, res);
                    stats.background = true;
                    stats.draw_calls += 1;
                }
            }
            FrameStep::BlitTrail => {
                if let Some(blit) = res.programs.blit.as_ref() {
                    draw_quad(&mut pass, blit.blended(), &res.trail, res);
                    stats.trail = true;
                    stats.draw_calls += 1;
                }
            }
            FrameStep::DrawDynamic { count } => {
                if let Some(point) = res.programs.point.as_ref() {
                    draw_points(
                        &mut pass,
                        point.surface(),
                        &res.surface_points,
                        &res.dynamic,
                        count,
                    );
                    stats.dynamic_points += count;
                    stats.draw_calls += 1;
                }
            }
            // Baked in `encode_bake`; the clear is the load op above; rewind
            // and present happen after submission.
            FrameStep::BakeStatic { .. }
            | FrameStep::ClearSurface
            | FrameStep::ResetCursors
            | FrameStep::Present => {}
        }
    }
}

/// Encode a bare clear of `target` to opaque black.
pub fn encode_clear(encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
    let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Clear Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        ..Default::default()
    });
}

fn set_viewport(pass: &mut wgpu::RenderPass<'_>, viewport: (u32, u32)) {
    pass.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);
}

fn draw_points<'a>(
    pass: &mut wgpu::RenderPass<'a>,
    pipeline: &'a wgpu::RenderPipeline,
    bind_group: &'a wgpu::BindGroup,
    streams: &'a ParticleStreams,
    count: u32,
) {
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.set_vertex_buffer(0, streams.positions.slice(..));
    pass.set_vertex_buffer(1, streams.colors.slice(..));
    pass.draw(0..count, 0..1);
}

fn draw_quad<'a>(
    pass: &mut wgpu::RenderPass<'a>,
    pipeline: &'a wgpu::RenderPipeline,
    layer: &'a TextureLayer,
    res: &'a GpuResources,
) {
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, &layer.bind_group, &[]);
    pass.set_vertex_buffer(0, res.quad.positions.slice(..));
    pass.set_vertex_buffer(1, res.quad.texcoords.slice(..));
    pass.set_index_buffer(res.quad.indices.slice(..), wgpu::IndexFormat::Uint16);
    pass.draw_indexed(0..res.quad.index_count(), 0, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_plan_runs_in_protocol_order() {
        let plan = FramePlan::build(4, 2, true);
        assert_eq!(
            plan.steps(),
            &[
                FrameStep::BakeStatic { count: 4 },
                FrameStep::ClearSurface,
                FrameStep::BlitBackground,
                FrameStep::BlitTrail,
                FrameStep::DrawDynamic { count: 2 },
                FrameStep::ResetCursors,
                FrameStep::Present,
            ]
        );
    }

    #[test]
    fn empty_frame_still_composites_the_trail() {
        let plan = FramePlan::build(0, 0, false);
        assert_eq!(
            plan.steps(),
            &[
                FrameStep::ClearSurface,
                FrameStep::BlitTrail,
                FrameStep::ResetCursors,
                FrameStep::Present,
            ]
        );
        assert_eq!(plan.bake_count(), None);
    }

    #[test]
    fn static_bake_precedes_trail_blit() {
        let plan = FramePlan::build(1, 0, false);
        let bake = plan
            .steps()
            .iter()
            .position(|s| matches!(s, FrameStep::BakeStatic { .. }))
            .unwrap();
        assert!(bake < plan.trail_index().unwrap());
    }

    #[test]
    fn dynamic_points_are_drawn_last() {
        let plan = FramePlan::build(3, 5, true);
        let dynamic = plan
            .steps()
            .iter()
            .position(|s| matches!(s, FrameStep::DrawDynamic { .. }))
            .unwrap();
        assert!(dynamic > plan.trail_index().unwrap());
        assert_eq!(plan.steps()[dynamic + 1], FrameStep::ResetCursors);
    }

    #[test]
    fn two_dynamic_particles_become_one_draw_of_two_points() {
        let plan = FramePlan::build(0, 2, false);
        assert_eq!(
            plan.steps(),
            &[
                FrameStep::ClearSurface,
                FrameStep::BlitTrail,
                FrameStep::DrawDynamic { count: 2 },
                FrameStep::ResetCursors,
                FrameStep::Present,
            ]
        );
        assert_eq!(plan.bake_count(), None);
    }

    #[test]
    fn static_particle_is_baked_before_the_same_frame_trail_blit() {
        let plan = FramePlan::build(1, 0, false);
        assert_eq!(plan.bake_count(), Some(1));
        assert_eq!(plan.steps()[0], FrameStep::BakeStatic { count: 1 });
        assert_eq!(plan.trail_index(), Some(2));
    }

    #[test]
    fn every_plan_rewinds_before_presenting() {
        for (s, d, bg) in [(0, 0, false), (5, 0, true), (0, 9, true), (3, 3, false)] {
            let plan = FramePlan::build(s, d, bg);
            let steps = plan.steps();
            let n = steps.len();
            assert_eq!(steps[n - 2], FrameStep::ResetCursors);
            assert_eq!(steps[n - 1], FrameStep::Present);
        }
    }

    #[test]
    fn stats_sum_points() {
        let stats = FrameStats {
            static_points: 3,
            dynamic_points: 2,
            ..Default::default()
        };
        assert_eq!(stats.points(), 5);
    }
}
