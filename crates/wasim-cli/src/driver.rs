//! The simulation driver: a deterministic, ordered step executor.
//!
//! Each step moves through decode → execute → assert → print. A failing
//! step emits a structured response and halts the plan. Side effects of a
//! step are visible to later steps only if the call succeeded and the step
//! committed the pending-writes buffer.

use crate::error::SimulatorError;
use crate::keys::create_named_key;
use crate::marshal::create_params;
use crate::output::{self, Response, StepResult};
use crate::plan::{
    validate_assertion, Endpoint, ParamValue, Plan, Step, PROGRAM_CREATE,
};
use std::collections::HashMap;
use wasim_runtime::{default_imports, Runtime, RuntimeConfig, MEMORY_PAGE_SIZE};
use wasim_state::{get_program, get_public_key, set_program, StateView};
use wasim_types::ProgramId;

/// Ordered step executor for one simulation plan.
pub struct Driver {
    state: StateView,
    plan: Plan,
    /// `step_N` → program id bindings from successful deploys
    program_map: HashMap<String, ProgramId>,
}

impl Driver {
    pub fn new(state: StateView, plan: Plan) -> Self {
        Self {
            state,
            plan,
            program_map: HashMap::new(),
        }
    }

    /// Execute the plan's steps in declaration order, printing one
    /// structured response per step. The first failing step halts the plan
    /// after its response is emitted.
    pub fn run(&mut self) -> Result<Vec<Response>, SimulatorError> {
        if self.plan.steps.is_empty() {
            return Err(SimulatorError::InvalidPlan("no steps found".to_string()));
        }

        output::print_plan_banner(&self.plan.name);
        tracing::debug!(plan = %self.plan.name, steps = self.plan.steps.len(), "simulation");

        if let Some(caller_key) = self.plan.caller_key.clone() {
            self.ensure_caller_key(&caller_key)?;
        }

        let steps = self.plan.steps.clone();
        let mut responses = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            tracing::debug!(step = index, description = %step.description, "simulation step");

            match self.execute_step(index, step) {
                Ok(result) => {
                    let response = Response {
                        id: index,
                        error: None,
                        result: Some(result),
                    };
                    response.print();
                    responses.push(response);
                }
                Err(e) => {
                    let response = Response {
                        id: index,
                        error: Some(e.to_string()),
                        result: None,
                    };
                    response.print();
                    responses.push(response);
                    return Err(e);
                }
            }
        }

        Ok(responses)
    }

    fn execute_step(&mut self, index: usize, step: &Step) -> Result<StepResult, SimulatorError> {
        match step.endpoint {
            Endpoint::Key => self.execute_key_step(step),
            Endpoint::Execute | Endpoint::ReadOnly => {
                let method = step
                    .method
                    .as_deref()
                    .ok_or_else(|| SimulatorError::InvalidStep("method required".to_string()))?;

                if method == PROGRAM_CREATE {
                    if step.endpoint == Endpoint::ReadOnly {
                        return Err(SimulatorError::InvalidStep(
                            "program_create requires the execute endpoint".to_string(),
                        ));
                    }
                    self.execute_create_step(index, step)
                } else {
                    self.execute_call_step(step, method, step.endpoint == Endpoint::Execute)
                }
            }
            Endpoint::Unknown => Err(SimulatorError::InvalidEndpoint),
        }
    }

    /// `key`: create the named key; a duplicate name is logged and
    /// tolerated.
    fn execute_key_step(&mut self, step: &Step) -> Result<StepResult, SimulatorError> {
        let name = match step.params.first() {
            Some(param) => match param.decode()? {
                ParamValue::String(name) => name,
                other => {
                    return Err(SimulatorError::FailedParamTypeCast(
                        other.type_name().to_string(),
                    ))
                }
            },
            None => return Err(SimulatorError::KeyNameRequired),
        };

        match create_named_key(&self.state, &name) {
            Ok(()) => {}
            Err(SimulatorError::DuplicateKeyName(_)) => {
                tracing::debug!(key = %name, "key already exists");
            }
            Err(e) => return Err(e),
        }

        Ok(StepResult {
            msg: Some(format!("created key {}", name)),
            ..Default::default()
        })
    }

    /// `execute.program_create`: read the wasm file, assign a fresh id,
    /// store and commit, and bind `step_N` in the program map.
    fn execute_create_step(
        &mut self,
        index: usize,
        step: &Step,
    ) -> Result<StepResult, SimulatorError> {
        let path = match step.params.first() {
            Some(param) => match param.decode()? {
                ParamValue::String(path) => path,
                other => {
                    return Err(SimulatorError::FailedParamTypeCast(
                        other.type_name().to_string(),
                    ))
                }
            },
            None => return Err(SimulatorError::ProgramPathRequired),
        };

        let bytes = std::fs::read(&path)?;
        let id = ProgramId::random();
        set_program(&self.state, &id, &bytes);
        self.state.commit()?;

        self.program_map.insert(format!("step_{}", index), id);
        tracing::debug!(step = index, id = %id, "program created");

        Ok(StepResult {
            id: Some(id.to_string()),
            ..Default::default()
        })
    }

    /// A program call: `execute` commits on success, `readonly` never
    /// commits. Assertions evaluate after the step's commit semantics
    /// apply; a failed call discards everything it wrote.
    fn execute_call_step(
        &mut self,
        step: &Step,
        function: &str,
        commit: bool,
    ) -> Result<StepResult, SimulatorError> {
        if step.params.len() < 2 {
            return Err(SimulatorError::InvalidStep(
                "execute requires at least 2 params".to_string(),
            ));
        }

        let program_id = match step.params[0].decode()? {
            ParamValue::Id(text) => self.resolve_program_id(&text)?,
            _ => {
                return Err(SimulatorError::InvalidParamType(
                    step.params[0].param_type.clone(),
                ))
            }
        };
        let max_units = match step.params[1].decode()? {
            ParamValue::U64(units) => units,
            _ => {
                return Err(SimulatorError::InvalidParamType(
                    step.params[1].param_type.clone(),
                ))
            }
        };

        let program_bytes = get_program(&self.state, &program_id)?
            .ok_or_else(|| SimulatorError::ProgramNotFound(program_id.to_string()))?;

        let mut cfg = RuntimeConfig::new(max_units);
        if let Some(pages) = self.plan.config.max_memory_pages {
            cfg = cfg.with_limit_max_memory(pages * MEMORY_PAGE_SIZE);
        }

        let mut runtime = Runtime::new(cfg, self.state.clone(), default_imports())?;
        let outcome = self.drive_call(&mut runtime, &program_id, &program_bytes, function, step);
        runtime.stop();

        let (response, balance) = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state.discard();
                return Err(e);
            }
        };

        if commit {
            self.state.commit()?;
        } else {
            self.state.discard();
        }

        if let Some(require) = &step.require {
            if let Some(assertion) = &require.result {
                let actual = response.first().copied().unwrap_or(0);
                if !validate_assertion(actual, assertion) {
                    return Err(SimulatorError::ResultAssertionFailed {
                        actual,
                        operator: assertion.operator,
                        operand: assertion.operand,
                    });
                }
            }
            if let Some(assertion) = &require.balance {
                if !validate_assertion(balance, assertion) {
                    return Err(SimulatorError::BalanceAssertionFailed {
                        actual: balance,
                        operator: assertion.operator,
                        operand: assertion.operand,
                    });
                }
            }
        }

        // a fresh id stands in for the transaction id a live chain would
        // assign to this call
        let call_id = ProgramId::random();
        tracing::debug!(function, ?response, balance, "call complete");

        Ok(StepResult {
            id: Some(call_id.to_string()),
            msg: None,
            response: Some(response),
            balance: Some(balance),
        })
    }

    /// Initialize, marshal and call; returns the raw results and the
    /// remaining fuel balance.
    fn drive_call(
        &self,
        runtime: &mut Runtime,
        program_id: &ProgramId,
        program_bytes: &[u8],
        function: &str,
        step: &Step,
    ) -> Result<(Vec<u64>, u64), SimulatorError> {
        runtime.initialize(program_bytes)?;

        let args = create_params(
            runtime,
            program_id,
            &self.state,
            &self.program_map,
            &step.params[2..],
        )?;

        let response = runtime.call(function, &args)?;
        let balance = runtime.meter()?.get_balance()?;
        Ok((response, balance))
    }

    /// A value matching `step_N` always resolves via the program map
    /// first; otherwise it is parsed as an id. Both failing is
    /// `ProgramNotFound`.
    fn resolve_program_id(&self, text: &str) -> Result<ProgramId, SimulatorError> {
        if let Some(id) = self.program_map.get(text) {
            return Ok(*id);
        }
        text.parse()
            .map_err(|_| SimulatorError::ProgramNotFound(text.to_string()))
    }

    /// The plan's default caller key: created on first use so every step
    /// can reference it.
    fn ensure_caller_key(&mut self, name: &str) -> Result<(), SimulatorError> {
        if get_public_key(&self.state, name)?.is_some() {
            return Ok(());
        }
        tracing::debug!(key = name, "creating plan caller key");
        create_named_key(&self.state, name)
    }
}
