//! Response post-processing: extract marked fragments, execute them in
//! order, and splice the execution reports back into the model's answer.

use tracing::info;

use crate::{
    execute::{CodeExecutor, ExecutionOutcome, ExecutionReport},
    extract::{Fragment, FragmentExtractor, strip_code_fence},
};

/// Notice spliced in place of a fragment whose trimmed content is empty.
pub const EMPTY_BLOCK_NOTICE: &str = "[Empty code execution block]";

/// Final text plus the execution tallies the caller folds into its stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedResponse {
    pub text: String,
    /// Executor invocations (empty fragments never reach the executor).
    pub executions_attempted: u64,
    /// Invocations whose report carried an error outcome.
    pub execution_errors: u64,
}

/// The extract → execute → reassemble pipeline for one model response.
#[derive(Debug)]
pub struct ResponsePipeline<E> {
    extractor: FragmentExtractor,
    executor: E,
}

impl<E: CodeExecutor> ResponsePipeline<E> {
    pub fn new(extractor: FragmentExtractor, executor: E) -> Self {
        Self {
            extractor,
            executor,
        }
    }

    /// Process one response. Fragments run strictly left-to-right, one at a
    /// time; a response without markers passes through untouched.
    pub async fn process(&self, response: &str) -> ProcessedResponse {
        let fragments: Vec<Fragment> = self.extractor.fragments(response).collect();
        if fragments.is_empty() {
            return ProcessedResponse {
                text: response.to_string(),
                executions_attempted: 0,
                execution_errors: 0,
            };
        }

        info!("found {} executable fragment(s) in model response", fragments.len());

        let mut attempted = 0;
        let mut errors = 0;
        let mut replacements = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let block = if fragment.code.is_empty() {
                EMPTY_BLOCK_NOTICE.to_string()
            } else {
                attempted += 1;
                let report = self.executor.execute(strip_code_fence(&fragment.code)).await;
                if report.is_error() {
                    errors += 1;
                }
                render_block(&report)
            };
            replacements.push((fragment, block));
        }

        ProcessedResponse {
            text: reassemble(response, &replacements),
            executions_attempted: attempted,
            execution_errors: errors,
        }
    }
}

/// Splice each replacement block over its fragment's span, copying the
/// literal gaps and the tail verbatim. Zero replacements is the identity.
pub fn reassemble(original: &str, replacements: &[(Fragment, String)]) -> String {
    if replacements.is_empty() {
        return original.to_string();
    }

    let mut out = String::with_capacity(original.len());
    let mut cursor = 0;
    for (fragment, block) in replacements {
        out.push_str(&original[cursor..fragment.start]);
        out.push_str(block);
        cursor = fragment.end;
    }
    out.push_str(&original[cursor..]);
    out
}

/// Render one execution report as the inline block spliced into the answer.
pub fn render_block(report: &ExecutionReport) -> String {
    let body = match &report.outcome {
        ExecutionOutcome::TimedOut { limit_secs } => {
            format!("[Code execution timed out after {limit_secs} seconds]")
        }
        ExecutionOutcome::LaunchFailed { detail } => {
            format!("[Error during code execution: {detail}]")
        }
        ExecutionOutcome::Completed { exit_code } => {
            let mut sections = String::new();
            if !report.stdout.is_empty() {
                sections.push_str(&format!(
                    "**Execution Output:**\n```\n{}\n```\n",
                    report.stdout
                ));
            }
            if !report.stderr.is_empty() {
                sections.push_str(&format!(
                    "**Execution Errors:**\n```\n{}\n```\n",
                    report.stderr
                ));
            }
            if sections.is_empty() {
                sections.push_str("[No output from execution]\n");
            }
            match exit_code {
                Some(code) => sections.push_str(&format!("*Exit code: {code}*")),
                None => sections.push_str("*Exit code: killed by signal*"),
            }
            sections
        }
    };

    format!("\n--- Executed Code Block ---\n{body}\n--- End Execution ---\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const START: &str = "%%PYTHON_EXECUTE_BLOCK_START%%";
    const END: &str = "%%PYTHON_EXECUTE_BLOCK_END%%";

    /// Scripted executor: maps code text to a canned report and counts calls.
    #[derive(Debug, Default)]
    struct ScriptedExecutor {
        calls: AtomicUsize,
        reports: Vec<(String, ExecutionReport)>,
    }

    impl ScriptedExecutor {
        fn with(reports: Vec<(&str, ExecutionReport)>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reports: reports
                    .into_iter()
                    .map(|(code, report)| (code.to_string(), report))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl CodeExecutor for ScriptedExecutor {
        async fn execute(&self, code: &str) -> ExecutionReport {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reports
                .iter()
                .find(|(expected, _)| expected == code)
                .map(|(_, report)| report.clone())
                .unwrap_or_else(|| panic!("unexpected code executed: {code:?}"))
        }
    }

    fn ok_report(stdout: &str) -> ExecutionReport {
        ExecutionReport {
            stdout: stdout.to_string(),
            stderr: String::new(),
            outcome: ExecutionOutcome::Completed { exit_code: Some(0) },
        }
    }

    fn pipeline(executor: ScriptedExecutor) -> ResponsePipeline<ScriptedExecutor> {
        ResponsePipeline::new(FragmentExtractor::new(START, END), executor)
    }

    #[test]
    fn reassemble_identity_on_no_matches() {
        for text in ["", "plain answer", "  whitespace \n preserved \t"] {
            assert_eq!(reassemble(text, &[]), text);
        }
    }

    #[tokio::test]
    async fn passthrough_without_markers_invokes_nothing() {
        let p = pipeline(ScriptedExecutor::default());
        let result = p.process("no blocks here").await;
        assert_eq!(result.text, "no blocks here");
        assert_eq!(result.executions_attempted, 0);
        assert_eq!(p.executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_fragment_is_replaced_in_place() {
        let p = pipeline(ScriptedExecutor::with(vec![(
            "print(1+1)",
            ok_report("2\n"),
        )]));
        let text = format!("before {START}\nprint(1+1)\n{END} after");
        let result = p.process(&text).await;

        assert!(result.text.starts_with("before \n--- Executed Code Block ---\n"));
        assert!(result.text.contains("```\n2\n\n```"));
        assert!(result.text.ends_with("--- End Execution ---\n after"));
        assert_eq!(result.executions_attempted, 1);
        assert_eq!(result.execution_errors, 0);
    }

    #[tokio::test]
    async fn fragments_execute_in_document_order() {
        let p = pipeline(ScriptedExecutor::with(vec![
            ("print('first')", ok_report("first\n")),
            ("print('second')", ok_report("second\n")),
        ]));
        let text = format!(
            "a {START}print('first'){END} b {START}print('second'){END} c"
        );
        let result = p.process(&text).await;

        let first = result.text.find("first").unwrap();
        let second = result.text.find("second").unwrap();
        assert!(first < second);
        assert_eq!(result.executions_attempted, 2);
        assert_eq!(p.executor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_fragment_gets_notice_not_execution() {
        let p = pipeline(ScriptedExecutor::default());
        let text = format!("x {START}   \n  {END} y");
        let result = p.process(&text).await;

        assert_eq!(result.text, format!("x {EMPTY_BLOCK_NOTICE} y"));
        assert_eq!(result.executions_attempted, 0);
        assert_eq!(p.executor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_fragment_reports_partial_output_and_error() {
        let p = pipeline(ScriptedExecutor::with(vec![(
            "boom()",
            ExecutionReport {
                stdout: "partial".to_string(),
                stderr: "Traceback: boom".to_string(),
                outcome: ExecutionOutcome::Completed { exit_code: Some(1) },
            },
        )]));
        let text = format!("{START}boom(){END}");
        let result = p.process(&text).await;

        assert!(result.text.contains("partial"));
        assert!(result.text.contains("**Execution Errors:**"));
        assert!(result.text.contains("Traceback: boom"));
        assert_eq!(result.execution_errors, 1);
    }

    #[tokio::test]
    async fn fenced_fragment_is_unwrapped_before_execution() {
        let p = pipeline(ScriptedExecutor::with(vec![(
            "print(1)",
            ok_report("1\n"),
        )]));
        let text = format!("{START}\n```python\nprint(1)\n```\n{END}");
        let result = p.process(&text).await;
        assert_eq!(result.executions_attempted, 1);
        assert!(result.text.contains("```\n1\n\n```"));
    }

    #[test]
    fn timed_out_block_renders_notice() {
        let block = render_block(&ExecutionReport {
            stdout: String::new(),
            stderr: String::new(),
            outcome: ExecutionOutcome::TimedOut { limit_secs: 10 },
        });
        assert!(block.contains("[Code execution timed out after 10 seconds]"));
    }

    #[test]
    fn silent_success_renders_no_output_notice() {
        let block = render_block(&ok_report(""));
        assert!(block.contains("[No output from execution]"));
        assert!(block.contains("*Exit code: 0*"));
    }
}
