use std::cell::RefCell;

/// One stack frame, as surfaced to a diagnostic message (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub func: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Result of parsing a captured stack trace: the part of the trace that ran
/// inside the currently executing logical task (a `forkJoin` child, for
/// instance), and the part that ran outside it. `inside_fiber` is `None`
/// when the capture point has no enclosing task boundary (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct StackParts {
    pub inside_fiber: Option<Vec<Frame>>,
    pub outside_fiber: Vec<Frame>,
}

thread_local! {
    /// Depths (frame-count from the capture point) at which `mark_boundary`
    /// wrapped functions were entered, most recent last. `parse` truncates
    /// a raw trace at the innermost recorded boundary so framework internals
    /// never reach a formatted diagnostic.
    static BOUNDARIES: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    /// Depths at which a task/fiber boundary (a `forkJoin` child's own
    /// logical stack) begins, most recent last.
    static FIBER_BOUNDARIES: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

/// Capture the native call stack at the current point, symbolized into
/// `Frame`s (outermost first truncated to innermost-first here, matching
/// how a thrown-error's stack is usually read: most recent call first).
/// Columns are not available from native symbol info, so `column` is
/// always `None` on a captured frame.
pub fn capture_frames() -> Vec<Frame> {
    let mut frames = Vec::new();
    backtrace::trace(|frame| {
        backtrace::resolve_frame(frame, |symbol| {
            frames.push(Frame {
                func: symbol.name().map(|n| n.to_string()),
                file: symbol.filename().map(|f| f.display().to_string()),
                line: symbol.lineno(),
                column: None,
            });
        });
        true
    });
    frames
}

/// Parse a raw captured trace into `{inside_fiber, outside_fiber}`, applying
/// any boundaries recorded by `mark_boundary`/`mark_fiber_boundary` at the
/// time of capture.
pub fn parse(raw: &[Frame]) -> StackParts {
    let boundary = BOUNDARIES.with(|b| b.borrow().last().copied());
    let truncated = match boundary {
        Some(depth) if depth <= raw.len() => &raw[..depth],
        _ => raw,
    };

    let fiber_depth = FIBER_BOUNDARIES.with(|b| b.borrow().last().copied());
    match fiber_depth {
        Some(depth) if depth <= truncated.len() => StackParts {
            inside_fiber: Some(truncated[..depth].to_vec()),
            outside_fiber: truncated[depth..].to_vec(),
        },
        _ => StackParts {
            inside_fiber: None,
            outside_fiber: truncated.to_vec(),
        },
    }
}

/// Concatenate `outsideFiber` + `insideFiber` (spec.md §4.A `useMyCaller`)
/// and drop the first `skip` frames (the framework itself, plus any caller
/// requested skip count), returning the new top frame if one remains.
pub fn top_frame_after_skip(parts: &StackParts, skip: usize) -> Option<Frame> {
    let mut frames = parts.outside_fiber.clone();
    if let Some(inside) = &parts.inside_fiber {
        frames.extend(inside.iter().cloned());
    }
    frames.into_iter().nth(skip)
}

/// Tag `fn` so that a trace captured anywhere inside it is truncated at this
/// frame by `parse`, hiding the build-message framework's own call stack
/// from reported diagnostics (spec.md §4.A `markBoundary`).
pub fn mark_boundary<R>(depth_at_entry: usize, f: impl FnOnce() -> R) -> R {
    BOUNDARIES.with(|b| b.borrow_mut().push(depth_at_entry));
    let result = f();
    BOUNDARIES.with(|b| {
        b.borrow_mut().pop();
    });
    result
}

/// Tag `fn` as the bottom of a logical task's own stack (spec.md §6
/// `markBottom`), so a trace captured inside it can be split into
/// `insideFiber`/`outsideFiber` by `parse`.
pub fn mark_fiber_boundary<R>(depth_at_entry: usize, f: impl FnOnce() -> R) -> R {
    push_fiber_boundary(depth_at_entry);
    let result = f();
    pop_fiber_boundary();
    result
}

/// Push a fiber-boundary depth. Paired with [`pop_fiber_boundary`]; exposed
/// separately from [`mark_fiber_boundary`] so an async task — which cannot
/// hold a `FnOnce` closure across an `.await` — can scope the boundary
/// around its own lifetime with an RAII guard instead (a `forkJoin` child
/// task is exactly this case; see `buildmessage::fork_join`).
pub fn push_fiber_boundary(depth_at_entry: usize) {
    FIBER_BOUNDARIES.with(|b| b.borrow_mut().push(depth_at_entry));
}

/// Pop the most recently pushed fiber-boundary depth.
pub fn pop_fiber_boundary() {
    FIBER_BOUNDARIES.with(|b| {
        b.borrow_mut().pop();
    });
}
