//! Format layer creation macros

/// Build a text fmt layer (`pretty` or `compact`) with the display options
/// applied and box it, dropping the timer when timestamps are disabled.
macro_rules! create_fmt_layer {
    ($format:ident, $display:expr, $writer:expr) => {{
        let layer = tracing_subscriber::fmt::layer()
            .$format()
            .with_writer($writer)
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids);

        if $display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

/// JSON variant: flattened events plus the current span.
macro_rules! create_json_layer {
    ($display:expr, $writer:expr) => {{
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer($writer)
            .with_current_span(true)
            .with_span_list(false)
            .flatten_event(true)
            .with_ansi(false)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids);

        if $display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}
