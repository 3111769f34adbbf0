#[derive(Copy, Clone)]
pub struct TransactionLabels {
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
}

#[macro_export]
macro_rules! generate_labels {
    ($base_name:expr) => {
        $crate::TransactionLabels {
            success: concat!("marbles_", stringify!($base_name), "_success"),
            error: concat!("marbles_", stringify!($base_name), "_error"),
            latency: concat!("marbles_", stringify!($base_name), "_latency"),
        }
    };
}

pub const CREATE_MARBLE_LABELS: TransactionLabels = generate_labels!(create_marble);
pub const TRANSFER_LABELS: TransactionLabels = generate_labels!(transfer);
