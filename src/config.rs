/// Default KDF parameters carried on every catalog. Implementations must not silently change
/// these; they are recorded in the header on `init` and echoed back on every `unlock`.
pub const DEFAULT_T_COST: u32 = 4;
pub const DEFAULT_M_COST_KIB: u32 = 262_144;
pub const DEFAULT_PARALLELISM: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    pub t_cost: u32,
    pub m_cost_kib: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            t_cost: DEFAULT_T_COST,
            m_cost_kib: DEFAULT_M_COST_KIB,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}
