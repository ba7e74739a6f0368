use crate::config::InterpreterConfig;
use crate::language::span::Position;
use crate::runtime::error::{RuntimeError, RuntimeResult};

#[derive(Clone, Debug, PartialEq)]
pub struct CallFrame {
    pub function: String,
    pub position: Position,
}

/// Per-run bookkeeping: call and loop stacks, captured output, and the trace taken
/// when the run first failed.
#[derive(Debug)]
pub struct ExecutionContext {
    file: String,
    config: InterpreterConfig,
    call_stack: Vec<CallFrame>,
    loop_stack: Vec<String>,
    output: Vec<String>,
    failure_trace: Option<String>,
}

impl ExecutionContext {
    pub fn new(file: impl Into<String>, config: InterpreterConfig) -> Self {
        Self {
            file: file.into(),
            config,
            call_stack: Vec::new(),
            loop_stack: Vec::new(),
            output: Vec::new(),
            failure_trace: None,
        }
    }

    pub fn push_frame(&mut self, function: &str, position: Position) -> RuntimeResult<()> {
        if self.call_stack.len() >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        self.call_stack.push(CallFrame {
            function: function.to_string(),
            position,
        });
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Option<CallFrame> {
        self.call_stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn enter_loop(&mut self, loop_id: &str) {
        self.loop_stack.push(loop_id.to_string());
    }

    pub fn exit_loop(&mut self) {
        self.loop_stack.pop();
    }

    pub fn active_loop(&self) -> Option<&str> {
        self.loop_stack.last().map(String::as_str)
    }

    pub fn write_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.config.echo_output {
            println!("{line}");
        }
        self.output.push(line);
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn format_stack_trace(&self) -> String {
        let limit = self.config.max_stack_frames;
        let mut lines: Vec<String> = self
            .call_stack
            .iter()
            .rev()
            .take(limit)
            .map(|frame| {
                format!(
                    "    at {} ({}:{}:{})",
                    frame.function, self.file, frame.position.start.line, frame.position.start.column
                )
            })
            .collect();
        if self.call_stack.len() > limit {
            lines.push(format!("    … {} more frames", self.call_stack.len() - limit));
        }
        lines.join("\n")
    }

    /// Keeps the first trace only; later calls while unwinding are ignored.
    pub fn capture_failure_trace(&mut self) {
        if self.failure_trace.is_none() {
            self.failure_trace = Some(self.format_stack_trace());
        }
    }

    pub fn clear_failure_trace(&mut self) {
        self.failure_trace = None;
    }

    pub fn failure_trace(&self) -> Option<&str> {
        self.failure_trace.as_deref()
    }
}
