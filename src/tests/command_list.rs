use crate::backend::RecordedBarrier;

use super::*;

fn barrier(resource: u64, before: AccessState, after: AccessState) -> RecordedBarrier {
    RecordedBarrier {
        resource,
        granularity: Granularity::Whole,
        before,
        after,
    }
}

#[test]
fn lifecycle() {
    let ctx = context();
    let mut list = ctx.create_command_list(QueueType::Main, Some("frame"));
    assert_eq!(list.state(), CommandListState::Idle);
    assert_eq!(list.debug_name(), "frame");

    list.open().unwrap();
    assert_eq!(list.state(), CommandListState::Recording);
    assert_eq!(
        list.command_buffer().map(|cb| cb.state()),
        Some(CommandBufferState::Recording)
    );
    assert_eq!(
        list.command_buffer().unwrap().raw().debug_name(),
        Some("frame")
    );

    list.close().unwrap();
    assert_eq!(list.state(), CommandListState::Closed);

    // Reopening a closed list throws the old recording away.
    list.open().unwrap();
    list.close().unwrap();
    assert_eq!(ctx.queue(QueueType::Main).command_buffer_count(), 1);

    let id = ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();
    assert_eq!(list.state(), CommandListState::Idle);
    assert!(ctx.wait_command_list(QueueType::Main, id, None));
}

#[test]
fn copy_buffer_records_transitions() {
    let ctx = context();
    let src = buffer(&ctx, "src");
    let dst = buffer(&ctx, "dst");

    let mut list = ctx.create_command_list(QueueType::Transfer, None);
    list.open().unwrap();
    list.begin_tracking_buffer(&src, AccessState::COMMON);
    list.begin_tracking_buffer(&dst, AccessState::COMMON);
    list.copy_buffer(&CopyBufferToBuffer {
        src: &src,
        src_offset: 0,
        dst: &dst,
        dst_offset: 64,
        len: 128,
    });
    assert!(list.pending_barriers().is_empty());
    assert_eq!(list.buffer_state(&src), AccessState::TRANSFER_READ);
    assert_eq!(list.buffer_state(&dst), AccessState::TRANSFER_WRITE);
    list.close().unwrap();
    ctx.submit(QueueType::Transfer, &mut [&mut list]).unwrap();

    let src = src.internal().handle();
    let dst = dst.internal().handle();
    assert_eq!(
        submitted_commands(&ctx, QueueType::Transfer),
        vec![
            RecordedCommand::Barriers(vec![
                barrier(src, AccessState::COMMON, AccessState::TRANSFER_READ),
                barrier(dst, AccessState::COMMON, AccessState::TRANSFER_WRITE),
            ]),
            RecordedCommand::CopyBuffer { src, dst, len: 128 },
        ]
    );
}

#[test]
fn barriers_accumulate_until_commit() {
    let ctx = context();
    let a = buffer(&ctx, "a");
    let b = buffer(&ctx, "b");

    let mut list = ctx.create_command_list(QueueType::Main, None);
    list.open().unwrap();
    list.begin_tracking_buffer(&a, AccessState::COMMON);
    list.begin_tracking_buffer(&b, AccessState::COMMON);
    list.require_buffer_access(&a, AccessState::SHADER_READ);
    list.require_buffer_access(&b, AccessState::SHADER_READ);
    assert_eq!(list.pending_barriers().len(), 2);

    list.commit_barriers();
    assert!(list.pending_barriers().is_empty());
    assert_eq!(list.command_buffer().unwrap().referenced_count(), 2);

    // Nothing pending, nothing recorded.
    list.commit_barriers();
    assert_eq!(list.command_buffer().unwrap().raw().commands().len(), 1);
    list.close().unwrap();
}

#[test]
fn keep_initial_state_restored_on_close() {
    let ctx = context();
    let uniforms = keep_initial_buffer(&ctx, "uniforms", AccessState::CONSTANT_BUFFER);

    let mut list = ctx.create_command_list(QueueType::Main, None);
    list.open().unwrap();
    list.write_buffer(&uniforms, 0, &[0; 16]);
    list.close().unwrap();
    assert!(list.drain_diagnostics().is_empty());
    ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    let handle = uniforms.internal().handle();
    assert_eq!(
        submitted_commands(&ctx, QueueType::Main),
        vec![
            RecordedCommand::Barriers(vec![barrier(
                handle,
                AccessState::CONSTANT_BUFFER,
                AccessState::TRANSFER_WRITE
            )]),
            RecordedCommand::WriteBuffer {
                buffer: handle,
                offset: 0,
                len: 16
            },
            RecordedCommand::Barriers(vec![barrier(
                handle,
                AccessState::TRANSFER_WRITE,
                AccessState::CONSTANT_BUFFER
            )]),
        ]
    );
}

#[test]
fn keep_initial_image_initialized_after_first_use() {
    let ctx = context();
    let texture = keep_initial_image(&ctx, "texture", AccessState::SHADER_READ);
    let handle = texture.internal().handle();
    let color = ClearColor::RgbaF32(0.0, 0.0, 0.0, 1.0);

    let mut list = ctx.create_command_list(QueueType::Main, None);
    list.open().unwrap();
    list.clear_image(&texture, SubresourceRange::ALL, color);
    list.close().unwrap();
    assert!(texture.state().is_state_initialized());
    ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    list.open().unwrap();
    list.clear_image(&texture, SubresourceRange::ALL, color);
    list.close().unwrap();
    ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    let submissions = ctx.backend().submissions(QueueType::Main);
    assert_eq!(
        submissions[0].commands[0],
        RecordedCommand::Barriers(vec![barrier(
            handle,
            AccessState::COMMON,
            AccessState::TRANSFER_WRITE
        )])
    );
    assert_eq!(
        submissions[1].commands[0],
        RecordedCommand::Barriers(vec![barrier(
            handle,
            AccessState::SHADER_READ,
            AccessState::TRANSFER_WRITE
        )])
    );
    assert_eq!(
        submissions[1].commands[1],
        RecordedCommand::ClearImage {
            image: handle,
            range: SubresourceRange::single(0, 0),
        }
    );
}

#[test]
fn permanent_state_promoted_on_close() {
    let ctx = context();
    let lut = buffer(&ctx, "lut");

    let mut list = ctx.create_command_list(QueueType::Main, None);
    list.open().unwrap();
    list.begin_tracking_buffer(&lut, AccessState::COMMON);
    list.set_permanent_buffer_state(&lut, AccessState::SHADER_READ);
    assert!(lut.state().permanent_state().is_none());
    list.close().unwrap();
    assert_eq!(lut.state().permanent_state(), Some(AccessState::SHADER_READ));
    ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    list.open().unwrap();
    list.require_buffer_access(&lut, AccessState::SHADER_READ);
    assert!(list.pending_barriers().is_empty());
    list.set_permanent_buffer_state(&lut, AccessState::VERTEX_BUFFER);
    list.close().unwrap();

    let diagnostics = list.drain_diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert!(matches!(
        diagnostics[0],
        TrackingDiagnostic::PermanentStateMismatch { .. }
    ));
    assert!(matches!(
        diagnostics[1],
        TrackingDiagnostic::PermanentStateConflict { .. }
    ));
    assert_eq!(lut.state().permanent_state(), Some(AccessState::SHADER_READ));
}

#[test]
fn permanent_state_needs_an_open_list() {
    let ctx = context();
    let lut = buffer(&ctx, "lut");

    let mut list = ctx.create_command_list(QueueType::Main, None);
    list.begin_tracking_buffer(&lut, AccessState::COMMON);

    // Debug builds assert on the misuse, release builds ignore the call.
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        list.set_permanent_buffer_state(&lut, AccessState::SHADER_READ);
    }));
    assert!(list.pending_barriers().is_empty());

    list.open().unwrap();
    list.close().unwrap();
    ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    assert!(lut.state().permanent_state().is_none());
    assert!(!submitted_commands(&ctx, QueueType::Main)
        .iter()
        .any(|command| matches!(command, RecordedCommand::Barriers(_))));
}

#[test]
fn dispatch_transitions_bindings() {
    let ctx = context();
    let data = buffer(&ctx, "data");
    let target = image(&ctx, "target", 1, 1);

    let layout = ctx
        .create_binding_layout(BindingLayoutDesc {
            items: vec![
                BindingLayoutItem {
                    slot: 0,
                    ty: BindingType::StorageBuffer,
                    count: 1,
                    stages: ShaderStages::COMPUTE,
                },
                BindingLayoutItem {
                    slot: 1,
                    ty: BindingType::SampledImage,
                    count: 1,
                    stages: ShaderStages::COMPUTE,
                },
            ],
            debug_name: None,
        })
        .unwrap();
    let set = ctx
        .create_binding_set(BindingSetDesc {
            layout: layout.clone(),
            items: vec![
                BindingSetItem {
                    slot: 0,
                    array_element: 0,
                    resource: BindingResource::StorageBuffer {
                        buffer: data.clone(),
                        writable: true,
                    },
                },
                BindingSetItem {
                    slot: 1,
                    array_element: 0,
                    resource: BindingResource::SampledImage {
                        image: target.clone(),
                        subresources: SubresourceRange::ALL,
                    },
                },
            ],
            debug_name: None,
        })
        .unwrap();
    let shader = ctx
        .create_shader(
            ShaderDesc {
                stage: ShaderStage::Compute,
                entry_point: String::from("main"),
                debug_name: None,
            },
            &[0x0723_0203],
        )
        .unwrap();
    let pipeline = ctx
        .create_compute_pipeline(ComputePipelineDesc {
            shader,
            layouts: vec![layout],
            debug_name: None,
        })
        .unwrap();

    let mut list = ctx.create_command_list(QueueType::Compute, None);
    list.open().unwrap();
    list.begin_tracking_buffer(&data, AccessState::COMMON);
    list.begin_tracking_image(&target, SubresourceRange::ALL, AccessState::COMMON);
    list.dispatch(
        &ComputeState {
            pipeline: &pipeline,
            bindings: &[&set],
        },
        8,
        8,
        1,
    );

    assert_eq!(list.buffer_state(&data), AccessState::SHADER_WRITE);
    assert_eq!(
        list.image_subresource_state(&target, 0, 0),
        AccessState::SHADER_READ
    );
    // Set, buffer, image and pipeline.
    assert_eq!(list.command_buffer().unwrap().referenced_count(), 4);

    // Dispatching again places a UAV barrier on the storage buffer only.
    list.dispatch(
        &ComputeState {
            pipeline: &pipeline,
            bindings: &[&set],
        },
        8,
        8,
        1,
    );
    list.close().unwrap();
    ctx.submit(QueueType::Compute, &mut [&mut list]).unwrap();

    let data = data.internal().handle();
    let target = target.internal().handle();
    assert_eq!(
        submitted_commands(&ctx, QueueType::Compute),
        vec![
            RecordedCommand::Barriers(vec![
                barrier(data, AccessState::COMMON, AccessState::SHADER_WRITE),
                barrier(target, AccessState::COMMON, AccessState::SHADER_READ),
            ]),
            RecordedCommand::Dispatch(8, 8, 1),
            RecordedCommand::Barriers(vec![barrier(
                data,
                AccessState::SHADER_WRITE,
                AccessState::SHADER_WRITE
            )]),
            RecordedCommand::Dispatch(8, 8, 1),
        ]
    );
}

#[test]
fn draw_inside_render_pass() {
    let ctx = context();
    let color = image(&ctx, "color", 1, 1);
    let vertices = buffer(&ctx, "vertices");

    let shader = ctx
        .create_shader(
            ShaderDesc {
                stage: ShaderStage::Vertex,
                entry_point: String::from("main"),
                debug_name: None,
            },
            &[0x0723_0203],
        )
        .unwrap();
    let pipeline = ctx
        .create_graphics_pipeline(GraphicsPipelineDesc {
            vertex: shader,
            fragment: None,
            layouts: Vec::default(),
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth_stencil: None,
            color_formats: vec![Format::Rgba8Unorm],
            depth_format: None,
            debug_name: None,
        })
        .unwrap();

    let mut list = ctx.create_command_list(QueueType::Main, None);
    list.open().unwrap();
    list.begin_tracking_image(&color, SubresourceRange::ALL, AccessState::COMMON);
    list.begin_tracking_buffer(&vertices, AccessState::TRANSFER_WRITE);

    list.begin_render_pass(&RenderPassDesc {
        color_attachments: vec![ColorAttachment {
            image: &color,
            mip_level: 0,
            array_layer: 0,
            load_op: LoadOp::Clear(ClearColor::RgbaF32(0.0, 0.0, 0.0, 0.0)),
            store_op: StoreOp::Store,
        }],
        depth_stencil_attachment: None,
    });
    list.draw(
        &GraphicsState {
            pipeline: &pipeline,
            bindings: &[],
            vertex_buffers: &[VertexBind {
                buffer: &vertices,
                offset: 0,
            }],
            index_buffer: None,
            indirect_buffer: None,
        },
        DrawArguments::Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        },
    );
    list.end_render_pass();
    list.close().unwrap();
    ctx.submit(QueueType::Main, &mut [&mut list]).unwrap();

    let color = color.internal().handle();
    let vertices = vertices.internal().handle();
    let commands = submitted_commands(&ctx, QueueType::Main);
    assert_eq!(commands.len(), 5);
    assert_eq!(
        commands[0],
        RecordedCommand::Barriers(vec![barrier(
            color,
            AccessState::COMMON,
            AccessState::COLOR_ATTACHMENT_WRITE
        )])
    );
    assert_eq!(
        commands[1],
        RecordedCommand::BeginRenderPass {
            color_attachments: vec![color],
            depth_stencil_attachment: None,
        }
    );
    assert_eq!(
        commands[2],
        RecordedCommand::Barriers(vec![barrier(
            vertices,
            AccessState::TRANSFER_WRITE,
            AccessState::VERTEX_BUFFER
        )])
    );
    assert!(matches!(commands[3], RecordedCommand::Draw(_)));
    assert_eq!(commands[4], RecordedCommand::EndRenderPass);
}

#[test]
fn dropping_open_list_returns_buffer() {
    let ctx = context();
    {
        let mut list = ctx.create_command_list(QueueType::Main, None);
        list.open().unwrap();
    }

    let queue = ctx.queue(QueueType::Main);
    assert_eq!(queue.free_count(), 1);
    assert_eq!(queue.in_flight_count(), 0);
}
