//! Response classification and the merge engine.
//!
//! Ordering within one response: removals first, then insertion-class
//! strategies in header-declared order, then morphs. Each instruction runs
//! its cancellable update hooks; a cancelled instruction leaves the rest of
//! the batch alone. The whole batch sits inside the optional view-transition
//! bracket. After the batch: the dialog-close trigger, the after-update
//! hooks (only when something was applied), then the journal drain that
//! re-scans added subtrees and unregisters removed ones.

use dom::{Document, InsertPosition, MorphOptions, Mutation, Node};
use protocol::{
    self, CLOSE_DIALOG_HEADER, LOCATION_HEADER, MERGE_HEADER, MORPH_IGNORE_ACTIVE_HEADER,
    MergeClass, MergeInstruction, MergeStrategy, ProtocolError, ResponseClass, WireResponse,
    content_type,
};

use crate::callbacks::DocumentCallbacks;
use crate::engine::DispatchOutcome;
use crate::error::EngineError;
use crate::pipeline::PipelineCtx;
use crate::registry::{self, Registry};
use crate::scripts;

pub(crate) fn settle(
    ctx: &mut PipelineCtx<'_>,
    element_id: &str,
    response: &WireResponse,
) -> Result<DispatchOutcome, EngineError> {
    match protocol::classify(response) {
        ResponseClass::FollowUp => {
            let location = response
                .header(LOCATION_HEADER)
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            Ok(DispatchOutcome::FollowUp { location })
        }
        ResponseClass::Diagnostic => {
            render_diagnostic(ctx, response);
            Ok(DispatchOutcome::DiagnosticRendered)
        }
        ResponseClass::NoContent => {
            let removals: Vec<MergeInstruction> = match response.header(MERGE_HEADER) {
                Some(value) => parse_header(value)?
                    .into_iter()
                    .filter(|i| i.strategy.class() == MergeClass::Removal)
                    .collect(),
                None => Vec::new(),
            };
            let applied = if removals.is_empty() {
                0
            } else {
                run_batch(ctx, element_id, &removals, &[], false)?
            };
            finish(ctx, element_id, response, applied)
        }
        ResponseClass::Merge => {
            let value = response
                .header(MERGE_HEADER)
                .ok_or(EngineError::MissingMergeHeader)?;
            let instructions = parse_header(value)?;
            let fragments = dom::parse_fragments(&response.body);
            let ignore_active = response.has_header(MORPH_IGNORE_ACTIVE_HEADER);
            let applied = run_batch(ctx, element_id, &instructions, &fragments, ignore_active)?;
            finish(ctx, element_id, response, applied)
        }
    }
}

fn finish(
    ctx: &mut PipelineCtx<'_>,
    element_id: &str,
    response: &WireResponse,
    applied: usize,
) -> Result<DispatchOutcome, EngineError> {
    close_dialog_if_requested(ctx.document, response)?;
    if applied > 0 {
        if let Some(entry) = ctx.registry.get_mut(element_id)
            && let Some(cb) = entry.callbacks.after_document_update.as_mut()
        {
            cb();
        }
        if let Some(cb) = ctx.callbacks.after_document_update.as_mut() {
            cb(element_id);
        }
    }
    drain_journal(ctx)?;
    Ok(DispatchOutcome::Completed {
        updated: applied > 0,
    })
}

fn run_batch(
    ctx: &mut PipelineCtx<'_>,
    element_id: &str,
    instructions: &[MergeInstruction],
    fragments: &[Node],
    ignore_active: bool,
) -> Result<usize, EngineError> {
    let transition = ctx.transition.take();
    let mut outcome: Option<Result<usize, EngineError>> = None;
    {
        let mut apply = || {
            outcome = Some(apply_batch(ctx, element_id, instructions, fragments, ignore_active));
        };
        match transition {
            Some(t) => t.around(&mut apply),
            None => apply(),
        }
    }
    outcome.unwrap_or(Ok(0))
}

fn apply_batch(
    ctx: &mut PipelineCtx<'_>,
    element_id: &str,
    instructions: &[MergeInstruction],
    fragments: &[Node],
    ignore_active: bool,
) -> Result<usize, EngineError> {
    let mut applied = 0;

    // removals first, so later inserts never reference a stale tree
    for instruction in instructions.iter().filter(|i| i.strategy.class() == MergeClass::Removal) {
        let Some(path) = ctx.document.path_to(&instruction.target) else {
            // a removal target already gone is not an error
            continue;
        };
        {
            let target = ctx.document.node_at(&path).expect("path just resolved");
            if !update_allowed(ctx.registry, ctx.callbacks, element_id, target, instruction.strategy) {
                continue;
            }
        }
        ctx.document.remove_element(&instruction.target);
        applied += 1;
    }

    // insertion-class strategies in header-declared order
    for instruction in instructions.iter().filter(|i| i.strategy.class() == MergeClass::Insertion) {
        let fragment = find_fragment(fragments, &instruction.target)?;
        if ctx.document.find(&instruction.target).is_none() {
            return Err(EngineError::MissingTarget {
                target: instruction.target.clone(),
            });
        }
        if !update_allowed(ctx.registry, ctx.callbacks, element_id, fragment, instruction.strategy) {
            continue;
        }
        match instruction.strategy {
            MergeStrategy::Swap => {
                ctx.document
                    .replace_element(&instruction.target, fragment.children().to_vec());
            }
            strategy => {
                let nodes: Vec<Node> = fragment
                    .children()
                    .iter()
                    .filter(|c| matches!(c, Node::Element { .. }))
                    .cloned()
                    .collect();
                if nodes.is_empty() {
                    continue;
                }
                ctx.document
                    .insert_adjacent(&instruction.target, insert_position(strategy), nodes);
            }
        }
        applied += 1;
    }

    // morphs last
    for instruction in instructions.iter().filter(|i| i.strategy.class() == MergeClass::Morph) {
        let fragment = find_fragment(fragments, &instruction.target)?;
        if ctx.document.find(&instruction.target).is_none() {
            return Err(EngineError::MissingTarget {
                target: instruction.target.clone(),
            });
        }
        if !update_allowed(ctx.registry, ctx.callbacks, element_id, fragment, instruction.strategy) {
            continue;
        }
        let new_children: Vec<Node> = fragment
            .children()
            .iter()
            .filter(|c| matches!(c, Node::Element { .. }))
            .cloned()
            .collect();
        let options = MorphOptions {
            outer_html: true,
            ignore_active_value: ignore_active,
        };
        let touched = ctx
            .reconcile
            .reconcile(ctx.document, &instruction.target, new_children, &options)
            .map_err(|_| EngineError::MissingTarget {
                target: instruction.target.clone(),
            })?;
        for id in touched {
            let Some(node) = ctx.document.find_node(id) else {
                continue;
            };
            if !matches!(node, Node::Element { .. }) {
                continue;
            }
            if let Some(cb) = ctx.callbacks.on_element_morphed.as_mut() {
                cb(node);
            }
        }
        applied += 1;
    }

    Ok(applied)
}

fn insert_position(strategy: MergeStrategy) -> InsertPosition {
    match strategy {
        MergeStrategy::Afterbegin => InsertPosition::AfterBegin,
        MergeStrategy::Afterend => InsertPosition::AfterEnd,
        MergeStrategy::Beforebegin => InsertPosition::BeforeBegin,
        MergeStrategy::Beforeend => InsertPosition::BeforeEnd,
        _ => unreachable!("insert_position is only called for adjacent strategies"),
    }
}

fn find_fragment<'a>(fragments: &'a [Node], target: &str) -> Result<&'a Node, EngineError> {
    let fragment_id = protocol::fragment_id(target);
    let Some(fragment) = fragments
        .iter()
        .find(|n| n.is_element_named("template") && n.html_id() == Some(fragment_id.as_str()))
    else {
        return Err(EngineError::MissingFragment {
            fragment: fragment_id,
        });
    };
    if fragment.children().is_empty() {
        return Err(EngineError::EmptyFragment {
            fragment: fragment_id,
        });
    }
    Ok(fragment)
}

/// Element-level then document-level `before_document_update`; either
/// returning false cancels just this instruction.
fn update_allowed(
    registry: &mut Registry,
    callbacks: &mut DocumentCallbacks,
    element_id: &str,
    subject: &Node,
    strategy: MergeStrategy,
) -> bool {
    if let Some(entry) = registry.get_mut(element_id)
        && let Some(cb) = entry.callbacks.before_document_update.as_mut()
        && !cb(subject, strategy)
    {
        return false;
    }
    if let Some(cb) = callbacks.before_document_update.as_mut()
        && !cb(element_id, subject, strategy)
    {
        return false;
    }
    true
}

fn close_dialog_if_requested(
    document: &mut Document,
    response: &WireResponse,
) -> Result<(), EngineError> {
    let Some(raw) = response.header(CLOSE_DIALOG_HEADER) else {
        return Ok(());
    };
    let trigger = protocol::parse_close_dialog_header(raw).map_err(protocol_error)?;
    if document.close_dialog(&trigger.dialog_id, trigger.on_close_data.as_deref())
        && let Some(form_id) = trigger.reset_form_id.as_deref()
    {
        document.reset_form(form_id);
    }
    Ok(())
}

/// The >= 400 branch: development-time diagnostics that intentionally
/// abandon the live page. Not an exception, not routed through interceptors.
fn render_diagnostic(ctx: &mut PipelineCtx<'_>, response: &WireResponse) {
    *ctx.subscription_active = false;
    ctx.registry.clear();
    ctx.document.replace_head("Error");
    let is_json = response.content_type().map(content_type::is_json).unwrap_or(false);
    let body = if is_json {
        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(value) => {
                let pretty =
                    serde_json::to_string_pretty(&value).expect("parsed JSON re-serializes");
                vec![Node::element(
                    "pre",
                    Vec::new(),
                    vec![Node::element("code", Vec::new(), vec![Node::text(&pretty)])],
                )]
            }
            Err(_) => vec![Node::text(&response.body)],
        }
    } else {
        vec![Node::text(&response.body)]
    };
    ctx.document.replace_body(body);
    ctx.document.discard_journal();
    log::error!(
        target: "seam.merge",
        "server signaled {}; live updates disabled for this page",
        response.status
    );
}

/// The child-list subscription: removals are unregistered and reported, added
/// subtrees are script-normalized, scanned, and reported, in delivered order.
/// Mutations caused by this processing (script rebuilds) join the queue.
pub(crate) fn drain_journal(ctx: &mut PipelineCtx<'_>) -> Result<(), EngineError> {
    if !*ctx.subscription_active {
        ctx.document.discard_journal();
        return Ok(());
    }
    loop {
        let batch = ctx.document.take_journal();
        if batch.is_empty() {
            return Ok(());
        }
        for record in batch {
            match record {
                Mutation::Removed(node) => {
                    if !matches!(node, Node::Element { .. }) {
                        continue;
                    }
                    registry::unscan_detached(ctx.registry, &node);
                    if let Some(cb) = ctx.callbacks.on_element_removed.as_mut() {
                        cb(&node);
                    }
                }
                Mutation::Added(id) => {
                    scripts::normalize_inserted(ctx.document, id, ctx.options.rebuild_inserted_scripts);
                    registry::scan_from(ctx.document, ctx.registry, ctx.callbacks, id)?;
                    if let Some(node) = ctx.document.find_node(id)
                        && matches!(node, Node::Element { .. })
                        && let Some(cb) = ctx.callbacks.on_element_added.as_mut()
                    {
                        cb(node);
                    }
                }
            }
        }
    }
}

fn parse_header(value: &str) -> Result<Vec<MergeInstruction>, EngineError> {
    protocol::parse_merge_header(value).map_err(protocol_error)
}

fn protocol_error(err: ProtocolError) -> EngineError {
    match err {
        ProtocolError::MalformedHeader { header, detail } => EngineError::MalformedHeader {
            header: header.to_string(),
            detail,
        },
        ProtocolError::UnknownMethod(method) => EngineError::MalformedHeader {
            header: "method".to_string(),
            detail: method,
        },
    }
}
