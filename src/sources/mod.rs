pub mod alb;
pub mod waf;
