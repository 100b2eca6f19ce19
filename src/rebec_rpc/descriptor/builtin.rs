//! Descriptors for the services this client ships with.
//!
//! These mirror the JSON request/response types the prompt and testcase servers register
//! with their gRPC JSON codec.

use super::{
    FieldDescriptor as F, FieldKind as K, MessageDescriptor, MethodDescriptor, PoolBuilder,
    ServiceDescriptor,
};

pub const PROMPT_SERVICE: &str = "prompt.v1.PromptService";
pub const TESTCASE_SERVICE: &str = "testcase.v1.TestcaseService";

fn msg(name: &str) -> K {
    K::Message(name.to_string())
}

pub fn register(builder: PoolBuilder) -> PoolBuilder {
    testcase(prompt(builder))
}

fn prompt(builder: PoolBuilder) -> PoolBuilder {
    builder
        .message(
            MessageDescriptor::new("prompt.v1.ToolFunction")
                .field(F::new("name", K::String))
                .field(F::new("parameters", K::Struct)),
        )
        .message(
            MessageDescriptor::new("prompt.v1.ToolDefinition")
                .field(F::new("type", K::String))
                .field(F::new("function", msg("prompt.v1.ToolFunction"))),
        )
        .message(
            MessageDescriptor::new("prompt.v1.ToolCall")
                .field(F::new("name", K::String))
                .field(F::new("arguments", K::Struct)),
        )
        .message(
            MessageDescriptor::new("prompt.v1.ContentBlock")
                .field(F::new("type", K::String))
                .field(F::new("text", K::String))
                .field(F::new("tool_call", msg("prompt.v1.ToolCall"))),
        )
        .message(
            MessageDescriptor::new("prompt.v1.Usage")
                .field(F::new("input_tokens", K::Int32))
                .field(F::new("output_tokens", K::Int32))
                .field(F::new("total_tokens", K::Int32)),
        )
        .message(
            MessageDescriptor::new("prompt.v1.PromptRunRequest")
                .field(F::new("tool_name", K::String).required())
                .field(F::new("model", K::String))
                .field(F::new("input", K::Value))
                .field(F::new("tools", msg("prompt.v1.ToolDefinition")).repeated())
                .field(F::new("temperature", K::Float))
                .field(F::new("max_output_tokens", K::Int32)),
        )
        .message(
            MessageDescriptor::new("prompt.v1.PromptRunResponse")
                .field(F::new("id", K::String))
                .field(F::new("object", K::String))
                .field(F::new("model", K::String))
                .field(F::new("created", K::Int64))
                .field(F::new("output", msg("prompt.v1.ContentBlock")).repeated())
                .field(F::new("usage", msg("prompt.v1.Usage"))),
        )
        .service(ServiceDescriptor::new(PROMPT_SERVICE).method(MethodDescriptor::new(
            "Run",
            "prompt.v1.PromptRunRequest",
            "prompt.v1.PromptRunResponse",
        )))
}

fn testcase(builder: PoolBuilder) -> PoolBuilder {
    builder
        .message(
            MessageDescriptor::new("testcase.v1.CreateTestcaseRequest")
                .field(F::new("title", K::String).required())
                .field(F::new("role", K::String))
                .field(F::new("experiment", K::String))
                .field(F::new("status", K::String))
                .field(F::new("name", K::String))
                .field(F::new("package", K::String))
                .field(F::new("classname", K::String))
                .field(F::new("error", K::String))
                .field(F::new("tags", K::Struct))
                .field(F::new("level", K::String))
                .field(F::new("file", K::String))
                .field(F::new("line", K::Int32))
                .field(F::new("execution_time", K::Double)),
        )
        .message(
            MessageDescriptor::new("testcase.v1.CreateTestcaseResponse")
                .field(F::new("id", K::String))
                .field(F::new("title", K::String))
                .field(F::new("status", K::String))
                .field(F::new("created", K::String)),
        )
        .message(
            MessageDescriptor::new("testcase.v1.ListTestcasesRequest")
                .field(F::new("role", K::String))
                .field(F::new("experiment", K::String))
                .field(F::new("status", K::String))
                .field(F::new("limit", K::Int32))
                .field(F::new("offset", K::Int32)),
        )
        .message(
            MessageDescriptor::new("testcase.v1.TestcaseItem")
                .field(F::new("id", K::String))
                .field(F::new("title", K::String))
                .field(F::new("status", K::String))
                .field(F::new("created", K::String))
                .field(F::new("name", K::String))
                .field(F::new("package", K::String))
                .field(F::new("classname", K::String))
                .field(F::new("experiment_id", K::String))
                .field(F::new("tags", K::Struct))
                .field(F::new("file", K::String))
                .field(F::new("line", K::Int32))
                .field(F::new("execution_time", K::Double)),
        )
        .message(
            MessageDescriptor::new("testcase.v1.ListTestcasesResponse")
                .field(F::new("items", msg("testcase.v1.TestcaseItem")).repeated()),
        )
        .message(
            MessageDescriptor::new("testcase.v1.DeleteTestcaseRequest")
                .field(F::new("id", K::String).required()),
        )
        .message(
            MessageDescriptor::new("testcase.v1.DeleteTestcaseResponse")
                .field(F::new("deleted", K::Int64)),
        )
        .service(
            ServiceDescriptor::new(TESTCASE_SERVICE)
                .method(MethodDescriptor::new(
                    "Create",
                    "testcase.v1.CreateTestcaseRequest",
                    "testcase.v1.CreateTestcaseResponse",
                ))
                .method(MethodDescriptor::new(
                    "List",
                    "testcase.v1.ListTestcasesRequest",
                    "testcase.v1.ListTestcasesResponse",
                ))
                .method(MethodDescriptor::new(
                    "Delete",
                    "testcase.v1.DeleteTestcaseRequest",
                    "testcase.v1.DeleteTestcaseResponse",
                )),
        )
}

#[cfg(test)]
mod tests {
    use crate::descriptor::DescriptorPool;

    #[test]
    fn builtins_resolve() {
        let pool = DescriptorPool::builder().with_builtins().build().unwrap();
        let names: Vec<_> = pool.services().map(|s| s.full_name.clone()).collect();
        assert_eq!(names, vec![super::PROMPT_SERVICE, super::TESTCASE_SERVICE]);
    }

    #[test]
    fn run_request_requires_tool_name() {
        let pool = DescriptorPool::builder().with_builtins().build().unwrap();
        let req = pool.message("prompt.v1.PromptRunRequest").unwrap();
        assert!(req.find_field("tool_name").unwrap().required);
        assert!(!req.find_field("model").unwrap().required);
    }

    #[test]
    fn bare_method_names_resolve_when_unique() {
        let pool = DescriptorPool::builder().with_builtins().build().unwrap();
        let (svc, m) = pool.resolve_method("List").unwrap();
        assert_eq!(svc.method_path(&m.name), "/testcase.v1.TestcaseService/List");
    }
}
