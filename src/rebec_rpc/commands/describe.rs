use crate::commands::CmdResult;
use crate::descriptor::DescriptorPool;
use crate::error::Result;

pub fn run(pool: &DescriptorPool, type_name: &str) -> Result<CmdResult> {
    let message = pool.find_message(type_name)?.clone();
    Ok(CmdResult::default().with_message_type(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_by_short_name() {
        let pool = DescriptorPool::builder().with_builtins().build().unwrap();
        let result = run(&pool, "PromptRunRequest").unwrap();
        let message = result.message_type.unwrap();
        assert_eq!(message.full_name, "prompt.v1.PromptRunRequest");
        assert_eq!(message.fields[0].name, "tool_name");
    }

    #[test]
    fn unknown_type_is_an_error() {
        let pool = DescriptorPool::builder().with_builtins().build().unwrap();
        assert!(run(&pool, "Nope").is_err());
    }
}
