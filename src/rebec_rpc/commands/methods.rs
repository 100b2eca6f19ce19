use crate::commands::{CmdResult, Notice};
use crate::descriptor::DescriptorPool;
use crate::error::Result;

pub fn run(pool: &DescriptorPool) -> Result<CmdResult> {
    let services: Vec<_> = pool.services().cloned().collect();
    let empty = services.is_empty();
    let result = CmdResult::default().with_services(services);
    Ok(if empty { result.notify(Notice::NoServices) } else { result })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_builtin_services() {
        let pool = DescriptorPool::builder().with_builtins().build().unwrap();
        let result = run(&pool).unwrap();
        assert_eq!(result.services.len(), 2);
        assert!(result.notices.is_empty());
    }

    #[test]
    fn empty_pool_warns() {
        let pool = DescriptorPool::builder().build().unwrap();
        let result = run(&pool).unwrap();
        assert_eq!(result.notices, vec![Notice::NoServices]);
    }
}
