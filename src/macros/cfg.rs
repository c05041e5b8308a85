#![allow(unused_macros)]

macro_rules! cfg_logger_env {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "logger_env")]
            #[cfg_attr(docsrs, doc(cfg(feature = "logger_env")))]
            $item
        )*
    }
}

macro_rules! cfg_logger_log4rs {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "logger_log4rs")]
            #[cfg_attr(docsrs, doc(cfg(feature = "logger_log4rs")))]
            $item
        )*
    }
}
