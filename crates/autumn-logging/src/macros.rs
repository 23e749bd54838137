//! ---
//! autumn_section: "03-logging"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Context-enriched logging macros."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
//! Macros that attach a [`LogContext`](crate::LogContext) to a tracing event.

#[doc(hidden)]
#[macro_export]
macro_rules! __autumn_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            service = ctx.service.unwrap_or(""),
            module = ctx.module.unwrap_or(""),
            phase = ctx.phase.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with Autumn context.
#[macro_export]
macro_rules! autumn_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with Autumn context.
#[macro_export]
macro_rules! autumn_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with Autumn context.
#[macro_export]
macro_rules! autumn_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with Autumn context.
#[macro_export]
macro_rules! autumn_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__autumn_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
