use std::fmt;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    barrier::{Granularity, PendingBarrierBatch},
    id_gen::ResourceId,
    resource::{Buffer, Image, ResourceStateExtension},
    subresource::SubresourceRange,
    types::AccessState,
    Backend,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image,
}

/// A state-consistency problem found while tracking. These never stop recording; they are
/// logged where they're found and kept on the tracker until drained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingDiagnostic {
    #[error(
        "permanent {kind} `{name}` doesn't have the right state bits. required: {:#x}, present: {:#x}",
        .required.bits(),
        .present.bits()
    )]
    PermanentStateMismatch {
        kind: ResourceKind,
        name: String,
        required: AccessState,
        present: AccessState,
    },
    #[error(
        "unknown prior state of {kind} `{name}`{}. call `begin_tracking` or set `keep_initial_state` before using it",
        fmt_subresource(.subresource)
    )]
    UnknownPriorState {
        kind: ResourceKind,
        name: String,
        subresource: Option<(u32, u32)>,
    },
    #[error(
        "attempted to switch permanent state of {kind} `{name}` from {:#x} to {:#x}",
        .from.bits(),
        .to.bits()
    )]
    PermanentStateConflict {
        kind: ResourceKind,
        name: String,
        from: AccessState,
        to: AccessState,
    },
}

/// Tracks the access state of every buffer and image touched by one command list, and turns
/// state requirements into barriers.
///
/// A tracking session lasts until [`ResourceStateTracker::command_list_submitted`], at which
/// point everything not backed by a permanent or initial state is forgotten.
pub struct ResourceStateTracker<B: Backend> {
    images: FxHashMap<ResourceId, ImageTracking<B>>,
    buffers: FxHashMap<ResourceId, BufferTracking<B>>,
    permanent_images: Vec<(Image<B>, AccessState)>,
    permanent_buffers: Vec<(Buffer<B>, AccessState)>,
    uav_barriers_by_default: bool,
    diagnostics: Vec<TrackingDiagnostic>,
}

struct TrackingState {
    /// Valid while `subresources` is empty.
    whole: AccessState,
    /// Per `(mip, layer)` state. Images only. Once populated the resource is tracked at
    /// subresource granularity until the session ends or tracking is restarted on the whole.
    subresources: Vec<AccessState>,
    uav_barriers_enabled: bool,
    first_uav_barrier_placed: bool,
    permanent_transition: bool,
}

struct ImageTracking<B: Backend> {
    image: Image<B>,
    state: TrackingState,
}

struct BufferTracking<B: Backend> {
    buffer: Buffer<B>,
    state: TrackingState,
}

impl<B: Backend> Default for ResourceStateTracker<B> {
    fn default() -> Self {
        Self::new(true)
    }
}

impl<B: Backend> ResourceStateTracker<B> {
    pub fn new(uav_barriers_by_default: bool) -> Self {
        Self {
            images: FxHashMap::default(),
            buffers: FxHashMap::default(),
            permanent_images: Vec::default(),
            permanent_buffers: Vec::default(),
            uav_barriers_by_default,
            diagnostics: Vec::default(),
        }
    }

    /// Declares the current state of some or all of an image. Redefines the state if the image
    /// is already tracked.
    pub fn begin_tracking_image(
        &mut self,
        image: &Image<B>,
        range: SubresourceRange,
        state: AccessState,
    ) {
        let range = range.resolve(image.mip_levels(), image.array_layers());
        if range.is_empty() {
            return;
        }

        let tracking = Self::image_entry(&mut self.images, image, self.uav_barriers_by_default);
        let ts = &mut tracking.state;

        if range.is_entire(image.mip_levels(), image.array_layers()) {
            ts.whole = state;
            ts.subresources.clear();
            return;
        }

        ts.expand(image.subresource_count());
        for (mip, layer) in range.iter() {
            ts.subresources[image.subresource_index(mip, layer)] = state;
        }
    }

    pub fn begin_tracking_buffer(&mut self, buffer: &Buffer<B>, state: AccessState) {
        let tracking = Self::buffer_entry(&mut self.buffers, buffer, self.uav_barriers_by_default);
        tracking.state.whole = state;
    }

    /// Transitions the image to `state` and, once the command list is submitted, pins it there.
    pub fn set_permanent_image_state(
        &mut self,
        batch: &mut PendingBarrierBatch<B>,
        image: &Image<B>,
        state: AccessState,
    ) {
        self.require_image(batch, image, SubresourceRange::ALL, state);
        if let Some(tracking) = self.images.get_mut(&image.id()) {
            tracking.state.permanent_transition = true;
        }
        self.permanent_images.push((image.clone(), state));
    }

    /// Transitions the buffer to `state` and, once the command list is submitted, pins it there.
    pub fn set_permanent_buffer_state(
        &mut self,
        batch: &mut PendingBarrierBatch<B>,
        buffer: &Buffer<B>,
        state: AccessState,
    ) {
        self.require_buffer(batch, buffer, state);
        if let Some(tracking) = self.buffers.get_mut(&buffer.id()) {
            tracking.state.permanent_transition = true;
        }
        self.permanent_buffers.push((buffer.clone(), state));
    }

    pub fn set_enable_uav_barriers_for_image(&mut self, image: &Image<B>, enabled: bool) {
        let tracking = Self::image_entry(&mut self.images, image, self.uav_barriers_by_default);
        tracking.state.uav_barriers_enabled = enabled;
        tracking.state.first_uav_barrier_placed = false;
    }

    pub fn set_enable_uav_barriers_for_buffer(&mut self, buffer: &Buffer<B>, enabled: bool) {
        let tracking = Self::buffer_entry(&mut self.buffers, buffer, self.uav_barriers_by_default);
        tracking.state.uav_barriers_enabled = enabled;
        tracking.state.first_uav_barrier_placed = false;
    }

    /// Requires `state` on a range of an image, appending any barriers needed to get there.
    pub fn require_image(
        &mut self,
        batch: &mut PendingBarrierBatch<B>,
        image: &Image<B>,
        range: SubresourceRange,
        state: AccessState,
    ) {
        puffin::profile_function!();

        if let Some(permanent) = image.state().permanent_state() {
            check_permanent(
                &mut self.diagnostics,
                ResourceKind::Image,
                image.debug_name(),
                permanent,
                state,
            );
            return;
        }

        let mip_levels = image.mip_levels();
        let array_layers = image.array_layers();
        let range = range.resolve(mip_levels, array_layers);
        if range.is_empty() {
            return;
        }

        let tracking = Self::image_entry(&mut self.images, image, self.uav_barriers_by_default);
        let ts = &mut tracking.state;

        // Whole resource, tracked as a whole.
        if ts.subresources.is_empty() && range.is_entire(mip_levels, array_layers) {
            if ts.whole.is_unknown() {
                report(
                    &mut self.diagnostics,
                    TrackingDiagnostic::UnknownPriorState {
                        kind: ResourceKind::Image,
                        name: image.debug_name().to_owned(),
                        subresource: None,
                    },
                );
            }

            let transition = ts.whole != state;
            let uav = ts.uav_necessary(state);
            if transition || uav {
                batch.push_image(image, Granularity::Whole, ts.whole, state);
            }
            if uav && !transition {
                ts.first_uav_barrier_placed = true;
            }
            ts.whole = state;
            return;
        }

        // Subresource granularity.
        let expanded = ts.subresources.is_empty();
        if expanded {
            if ts.whole.is_unknown() {
                report(
                    &mut self.diagnostics,
                    TrackingDiagnostic::UnknownPriorState {
                        kind: ResourceKind::Image,
                        name: image.debug_name().to_owned(),
                        subresource: None,
                    },
                );
            }
            ts.expand(image.subresource_count());
        }

        let uav = ts.uav_necessary(state);
        let mut placed_uav_barrier = false;

        for (mip, layer) in range.iter() {
            let idx = image.subresource_index(mip, layer);
            let prior = ts.subresources[idx];

            if prior.is_unknown() && !expanded {
                report(
                    &mut self.diagnostics,
                    TrackingDiagnostic::UnknownPriorState {
                        kind: ResourceKind::Image,
                        name: image.debug_name().to_owned(),
                        subresource: Some((mip, layer)),
                    },
                );
            }

            let transition = prior != state;
            if transition || uav {
                batch.push_image(image, Granularity::Subresource { mip, layer }, prior, state);
                placed_uav_barrier |= !transition;
            }
            ts.subresources[idx] = state;
        }

        if placed_uav_barrier {
            ts.first_uav_barrier_placed = true;
        }
    }

    /// Requires `state` on a buffer, appending a barrier if one is needed.
    pub fn require_buffer(
        &mut self,
        batch: &mut PendingBarrierBatch<B>,
        buffer: &Buffer<B>,
        state: AccessState,
    ) {
        puffin::profile_function!();

        if let Some(permanent) = buffer.state().permanent_state() {
            check_permanent(
                &mut self.diagnostics,
                ResourceKind::Buffer,
                buffer.debug_name(),
                permanent,
                state,
            );
            return;
        }

        let tracking = Self::buffer_entry(&mut self.buffers, buffer, self.uav_barriers_by_default);
        let ts = &mut tracking.state;

        if ts.whole.is_unknown() {
            report(
                &mut self.diagnostics,
                TrackingDiagnostic::UnknownPriorState {
                    kind: ResourceKind::Buffer,
                    name: buffer.debug_name().to_owned(),
                    subresource: None,
                },
            );
        }

        let transition = ts.whole != state;
        let uav = ts.uav_necessary(state);
        if transition || uav {
            batch.push_buffer(buffer, ts.whole, state);
        }
        if uav && !transition {
            ts.first_uav_barrier_placed = true;
        }
        ts.whole = state;
    }

    /// Returns every keep-initial-state resource touched this session to its initial state.
    pub fn keep_initial_states(&mut self, batch: &mut PendingBarrierBatch<B>) {
        puffin::profile_function!();

        let images: Vec<_> = self
            .images
            .values()
            .filter(|tracking| restores_initial_state(tracking.image.state(), &tracking.state))
            .map(|tracking| tracking.image.clone())
            .collect();

        for image in images {
            let state = image.state().initial_state();
            self.require_image(batch, &image, SubresourceRange::ALL, state);
        }

        let buffers: Vec<_> = self
            .buffers
            .values()
            .filter(|tracking| restores_initial_state(tracking.buffer.state(), &tracking.state))
            .map(|tracking| tracking.buffer.clone())
            .collect();

        for buffer in buffers {
            let state = buffer.state().initial_state();
            self.require_buffer(batch, &buffer, state);
        }
    }

    /// Ends the tracking session. Promotes requested permanent states and forgets everything
    /// else.
    pub fn command_list_submitted(&mut self) {
        for (image, state) in self.permanent_images.drain(..) {
            promote_permanent(
                &mut self.diagnostics,
                ResourceKind::Image,
                image.debug_name(),
                image.state(),
                state,
            );
        }

        for (buffer, state) in self.permanent_buffers.drain(..) {
            promote_permanent(
                &mut self.diagnostics,
                ResourceKind::Buffer,
                buffer.debug_name(),
                buffer.state(),
                state,
            );
        }

        for tracking in self.images.values() {
            let ext = tracking.image.state();
            if ext.keep_initial_state() && !ext.is_state_initialized() {
                ext.mark_initialized();
            }
        }

        for tracking in self.buffers.values() {
            let ext = tracking.buffer.state();
            if ext.keep_initial_state() && !ext.is_state_initialized() {
                ext.mark_initialized();
            }
        }

        self.images.clear();
        self.buffers.clear();
    }

    /// Current state of one subresource. Permanent images report their permanent state and
    /// untracked ones report [`AccessState::UNKNOWN`].
    pub fn image_subresource_state(&self, image: &Image<B>, mip: u32, layer: u32) -> AccessState {
        if let Some(permanent) = image.state().permanent_state() {
            return permanent;
        }

        match self.images.get(&image.id()) {
            Some(tracking) if tracking.state.subresources.is_empty() => tracking.state.whole,
            Some(tracking) => tracking
                .state
                .subresources
                .get(image.subresource_index(mip, layer))
                .copied()
                .unwrap_or(AccessState::UNKNOWN),
            None => AccessState::UNKNOWN,
        }
    }

    pub fn buffer_state(&self, buffer: &Buffer<B>) -> AccessState {
        if let Some(permanent) = buffer.state().permanent_state() {
            return permanent;
        }

        self.buffers
            .get(&buffer.id())
            .map(|tracking| tracking.state.whole)
            .unwrap_or(AccessState::UNKNOWN)
    }

    #[inline(always)]
    pub fn diagnostics(&self) -> &[TrackingDiagnostic] {
        &self.diagnostics
    }

    #[inline(always)]
    pub fn drain_diagnostics(&mut self) -> Vec<TrackingDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn image_entry<'a>(
        images: &'a mut FxHashMap<ResourceId, ImageTracking<B>>,
        image: &Image<B>,
        uav_barriers_enabled: bool,
    ) -> &'a mut ImageTracking<B> {
        images.entry(image.id()).or_insert_with(|| {
            let ext = image.state();
            let whole = if !ext.keep_initial_state() {
                AccessState::UNKNOWN
            } else if ext.is_state_initialized() {
                ext.initial_state()
            } else {
                // Images come out of creation in the common state.
                AccessState::COMMON
            };

            ImageTracking {
                image: image.clone(),
                state: TrackingState::new(whole, uav_barriers_enabled),
            }
        })
    }

    fn buffer_entry<'a>(
        buffers: &'a mut FxHashMap<ResourceId, BufferTracking<B>>,
        buffer: &Buffer<B>,
        uav_barriers_enabled: bool,
    ) -> &'a mut BufferTracking<B> {
        buffers.entry(buffer.id()).or_insert_with(|| {
            let ext = buffer.state();
            let whole = if ext.keep_initial_state() {
                ext.initial_state()
            } else {
                AccessState::UNKNOWN
            };

            BufferTracking {
                buffer: buffer.clone(),
                state: TrackingState::new(whole, uav_barriers_enabled),
            }
        })
    }
}

impl TrackingState {
    fn new(whole: AccessState, uav_barriers_enabled: bool) -> Self {
        Self {
            whole,
            subresources: Vec::default(),
            uav_barriers_enabled,
            first_uav_barrier_placed: false,
            permanent_transition: false,
        }
    }

    /// Switches to subresource granularity, copying the whole state into every slot.
    fn expand(&mut self, subresource_count: usize) {
        if self.subresources.is_empty() {
            self.subresources = vec![self.whole; subresource_count];
            self.whole = AccessState::UNKNOWN;
        }
    }

    #[inline(always)]
    fn uav_necessary(&self, state: AccessState) -> bool {
        state.has_unordered_access()
            && (self.uav_barriers_enabled || !self.first_uav_barrier_placed)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Buffer => write!(f, "buffer"),
            ResourceKind::Image => write!(f, "image"),
        }
    }
}

fn fmt_subresource(subresource: &Option<(u32, u32)>) -> String {
    match subresource {
        Some((mip, layer)) => format!(" (mip {mip}, layer {layer})"),
        None => String::default(),
    }
}

#[inline(always)]
fn restores_initial_state(ext: &ResourceStateExtension, state: &TrackingState) -> bool {
    ext.keep_initial_state()
        && !ext.initial_state().is_unknown()
        && ext.permanent_state().is_none()
        && !state.permanent_transition
}

fn report(diagnostics: &mut Vec<TrackingDiagnostic>, diagnostic: TrackingDiagnostic) {
    log::error!("{diagnostic}");
    diagnostics.push(diagnostic);
}

fn check_permanent(
    diagnostics: &mut Vec<TrackingDiagnostic>,
    kind: ResourceKind,
    name: &str,
    permanent: AccessState,
    required: AccessState,
) {
    if !permanent.contains(required) {
        report(
            diagnostics,
            TrackingDiagnostic::PermanentStateMismatch {
                kind,
                name: name.to_owned(),
                required,
                present: permanent,
            },
        );
    }
}

fn promote_permanent(
    diagnostics: &mut Vec<TrackingDiagnostic>,
    kind: ResourceKind,
    name: &str,
    ext: &ResourceStateExtension,
    state: AccessState,
) {
    match ext.permanent_state() {
        Some(existing) if existing != state => report(
            diagnostics,
            TrackingDiagnostic::PermanentStateConflict {
                kind,
                name: name.to_owned(),
                from: existing,
                to: state,
            },
        ),
        Some(_) => {}
        None => ext.set_permanent_state(state),
    }
}
