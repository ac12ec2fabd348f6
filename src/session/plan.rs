//! Trial records and the counterbalanced plan generator.
//!
//! The generator is a pure function from the counterbalance assignment and
//! a declarative [`SessionDesign`] to the ordered trial list: per block,
//! templates are replicated, shuffled within the block only, and appended;
//! block order itself is never shuffled, and trial numbers are assigned only
//! after the full sequence is concatenated. Probabilistic outcomes on choice
//! trials stay unresolved at plan time and are settled by
//! [`resolve_choice`] at the moment the participant's selection is recorded.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::consts::SHOCK_LEVELS;
use crate::errors::{Result, RigError};

use super::pulse::PatternKind;

/// Experiment phase a trial belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Calibration,
    Conditioning,
    Extinction,
    Renewal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Calibration => "calibration",
            Phase::Conditioning => "conditioning",
            Phase::Extinction => "extinction",
            Phase::Renewal => "renewal",
        };
        f.write_str(s)
    }
}

/// Stimulus delivered during the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stimulus {
    Tens,
    Control,
    None,
}

impl fmt::Display for Stimulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stimulus::Tens => "TENS",
            Stimulus::Control => "control",
            Stimulus::None => "none",
        };
        f.write_str(s)
    }
}

/// Visual context cue; only meaningful in the context-renewal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    A,
    B,
    Calibration,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Context::A => "A",
            Context::B => "B",
            Context::Calibration => "calibration",
        };
        f.write_str(s)
    }
}

/// Shock outcome delivered at the end of the countdown, mapped to a trigger
/// byte by the calibrated shock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    High,
    Medium,
    Low,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::High => "high",
            Outcome::Medium => "medium",
            Outcome::Low => "low",
        };
        f.write_str(s)
    }
}

/// The two TENS frequency conditions presented to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensCondition {
    Monopolar,
    Bipolar,
}

impl TensCondition {
    pub const ALL: [TensCondition; 2] = [TensCondition::Monopolar, TensCondition::Bipolar];

    pub fn name(&self) -> &'static str {
        match self {
            TensCondition::Monopolar => "monopolar",
            TensCondition::Bipolar => "bipolar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "monopolar" => Some(TensCondition::Monopolar),
            "bipolar" => Some(TensCondition::Bipolar),
            _ => None,
        }
    }
}

impl fmt::Display for TensCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Block position of a trial; calibration trials sit outside block counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockNumber {
    Calibration,
    Num(u32),
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockNumber::Calibration => f.write_str("calibration"),
            BlockNumber::Num(n) => write!(f, "{n}"),
        }
    }
}

/// One scheduled trial. Response fields start `None` and are written at
/// most once, by the trial runner, before persistence.
#[derive(Debug, Clone)]
pub struct Trial {
    pub phase: Phase,
    pub block: BlockNumber,
    pub trial_type: &'static str,
    pub stimulus: Stimulus,
    pub context: Context,
    pub choice1: Option<TensCondition>,
    pub choice2: Option<TensCondition>,
    pub is_choice_trial: bool,
    /// Per-block reinforcement probability; `None` for calibration trials.
    pub reinforcement_probability: Option<f64>,
    /// `None` until resolved (choice trials resolve at selection time).
    pub outcome: Option<Outcome>,
    pub choice_response: Option<TensCondition>,
    pub expectancy_response: Option<f64>,
    pub pain_response: Option<f64>,
    /// 1-based position in the final main sequence; `None` for calibration.
    pub trial_number: Option<u32>,
}

/// Deterministic condition assignment derived from the participant ID.
///
/// `index = participant_id % 4` selects the experimental group, which named
/// TENS condition is optimal vs suboptimal, and which condition receives
/// the "pause" vs "constant" pulse pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterbalance {
    pub index: u32,
    pub group: u32,
    pub group_name: &'static str,
    pub optimal: TensCondition,
    pub suboptimal: TensCondition,
}

impl Counterbalance {
    pub fn from_participant(participant_id: u32) -> Self {
        let index = participant_id % 4;
        let (group, group_name) = if index % 2 == 0 {
            (1, "consistent")
        } else {
            (2, "change")
        };
        let suboptimal = TensCondition::ALL[(index % 2) as usize];
        let optimal = TensCondition::ALL[((index + 1) % 2) as usize];
        Self {
            index,
            group,
            group_name,
            optimal,
            suboptimal,
        }
    }

    /// Which pulse pattern a condition receives under this counterbalance.
    pub fn pattern_kind(&self, condition: TensCondition) -> PatternKind {
        let pause_holder = if (self.index / 2) % 2 == 0 {
            self.suboptimal
        } else {
            self.optimal
        };
        if condition == pause_holder {
            PatternKind::Pause
        } else {
            PatternKind::Constant
        }
    }

    /// Reinforcement probabilities per conditioning block.
    pub fn conditioning_schedule(&self, blocks: usize) -> Vec<f64> {
        if self.group_name == "consistent" {
            vec![1.0; blocks]
        } else {
            // Reinforcement thins out across the session for the change group.
            let base = [1.0, 1.0, 0.75, 0.75, 0.5, 0.5, 0.25, 0.25, 0.0, 0.0];
            (0..blocks).map(|i| base[i % base.len()]).collect()
        }
    }
}

/// Parse a participant ID as typed at the CLI. Fails fast, before any port
/// or display resource is acquired, and is distinguishable from the
/// duplicate-data error raised later by the persistence sink.
pub fn parse_participant_id(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RigError::InvalidParticipantId(raw.to_string()));
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| RigError::InvalidParticipantId(raw.to_string()))
}

/// How a phase numbers its blocks in the persisted data. Conditioning pairs
/// consecutive blocks (`block / 2 + 1`); extinction keeps the raw 0-based
/// index. Both quirks are preserved so output matches the existing analysis
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockNumbering {
    HalvedOneBased,
    ZeroBased,
}

impl BlockNumbering {
    fn label(&self, block_index: u32) -> BlockNumber {
        match self {
            BlockNumbering::HalvedOneBased => BlockNumber::Num(block_index / 2 + 1),
            BlockNumbering::ZeroBased => BlockNumber::Num(block_index),
        }
    }
}

/// Per-condition trial template replicated into every block of a phase.
#[derive(Debug, Clone)]
pub struct TrialTemplate {
    pub trial_type: &'static str,
    pub count: u32,
    pub stimulus: Stimulus,
    pub is_choice_trial: bool,
    pub choice: Option<(TensCondition, TensCondition)>,
    pub outcome: Option<Outcome>,
}

/// One phase of the session: a template set replicated over a block list.
#[derive(Debug, Clone)]
pub struct PhasePlan {
    pub phase: Phase,
    pub context: Context,
    /// One reinforcement probability per block; its length is the block count.
    pub reinforcement: Vec<f64>,
    pub templates: Vec<TrialTemplate>,
    pub numbering: BlockNumbering,
}

impl PhasePlan {
    pub fn blocks(&self) -> usize {
        self.reinforcement.len()
    }

    pub fn trials_per_block(&self) -> u32 {
        self.templates.iter().map(|t| t.count).sum()
    }
}

/// Full declarative description of a session variant.
#[derive(Debug, Clone)]
pub struct SessionDesign {
    pub phases: Vec<PhasePlan>,
    pub shock_levels: u32,
    /// Whether context cues are shown during trials.
    pub uses_contexts: bool,
}

impl SessionDesign {
    /// The binary-choice variant: 10 conditioning blocks of 4 TENS choice
    /// trials + 1 control trial, then 10 extinction blocks of one trial per
    /// condition, all in a single context.
    pub fn choice_variant(cb: &Counterbalance) -> Self {
        let conditioning = PhasePlan {
            phase: Phase::Conditioning,
            context: Context::A,
            reinforcement: cb.conditioning_schedule(10),
            templates: vec![
                TrialTemplate {
                    trial_type: "TENS",
                    count: 4,
                    stimulus: Stimulus::Tens,
                    is_choice_trial: true,
                    choice: Some((cb.optimal, cb.suboptimal)),
                    outcome: None,
                },
                TrialTemplate {
                    trial_type: "control",
                    count: 1,
                    stimulus: Stimulus::Control,
                    is_choice_trial: false,
                    choice: None,
                    outcome: Some(Outcome::Low),
                },
            ],
            numbering: BlockNumbering::HalvedOneBased,
        };
        let extinction = PhasePlan {
            phase: Phase::Extinction,
            context: Context::A,
            reinforcement: vec![1.0; 10],
            templates: Self::extinction_templates(),
            numbering: BlockNumbering::ZeroBased,
        };
        let design = Self {
            phases: vec![conditioning, extinction],
            shock_levels: SHOCK_LEVELS,
            uses_contexts: false,
        };
        design.validate();
        design
    }

    /// The context-renewal variant: conditioning in context A, extinction in
    /// context B, then a short renewal phase back in context A reusing the
    /// extinction templates.
    pub fn context_renewal(cb: &Counterbalance) -> Self {
        let mut design = Self::choice_variant(cb);
        design.uses_contexts = true;
        design.phases[1].context = Context::B;
        design.phases.push(PhasePlan {
            phase: Phase::Renewal,
            context: Context::A,
            reinforcement: vec![1.0; 2],
            templates: Self::extinction_templates(),
            numbering: BlockNumbering::ZeroBased,
        });
        design.validate();
        design
    }

    fn extinction_templates() -> Vec<TrialTemplate> {
        TensCondition::ALL
            .iter()
            .map(|c| TrialTemplate {
                trial_type: c.name(),
                count: 1,
                stimulus: Stimulus::Tens,
                is_choice_trial: false,
                choice: None,
                outcome: Some(Outcome::Low),
            })
            .chain(std::iter::once(TrialTemplate {
                trial_type: "control",
                count: 1,
                stimulus: Stimulus::Control,
                is_choice_trial: false,
                choice: None,
                outcome: Some(Outcome::Low),
            }))
            .collect()
    }

    /// Malformed designs are programmer errors; fail fast with a diagnostic.
    fn validate(&self) {
        assert!(self.shock_levels >= 1, "design needs at least one shock level");
        for plan in &self.phases {
            assert!(
                !plan.templates.is_empty() && plan.blocks() > 0,
                "phase {} has an empty template or block list",
                plan.phase
            );
            assert!(
                plan.reinforcement.iter().all(|p| (0.0..=1.0).contains(p)),
                "phase {} has a reinforcement probability outside [0, 1]",
                plan.phase
            );
            for t in &plan.templates {
                assert!(t.count > 0, "template {} has zero count", t.trial_type);
                assert!(
                    t.is_choice_trial == t.choice.is_some(),
                    "template {} choice metadata is inconsistent",
                    t.trial_type
                );
                assert!(
                    !(t.is_choice_trial && t.outcome.is_some()),
                    "choice template {} must leave its outcome unresolved",
                    t.trial_type
                );
            }
        }
    }
}

/// The generated schedule: main trials in run order plus the separately
/// tracked calibration segment.
#[derive(Debug, Clone)]
pub struct TrialPlan {
    pub main: Vec<Trial>,
    pub calibration: Vec<Trial>,
}

/// Builds the full ordered trial list from a [`SessionDesign`].
pub struct TrialPlanGenerator<'a> {
    design: &'a SessionDesign,
}

impl<'a> TrialPlanGenerator<'a> {
    pub fn new(design: &'a SessionDesign) -> Self {
        Self { design }
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> TrialPlan {
        let mut main = Vec::new();
        for plan in &self.design.phases {
            for (block_index, &probability) in plan.reinforcement.iter().enumerate() {
                let mut block = Vec::with_capacity(plan.trials_per_block() as usize);
                for template in &plan.templates {
                    for _ in 0..template.count {
                        block.push(Trial {
                            phase: plan.phase,
                            block: plan.numbering.label(block_index as u32),
                            trial_type: template.trial_type,
                            stimulus: template.stimulus,
                            context: plan.context,
                            choice1: template.choice.map(|(a, _)| a),
                            choice2: template.choice.map(|(_, b)| b),
                            is_choice_trial: template.is_choice_trial,
                            reinforcement_probability: Some(probability),
                            outcome: template.outcome,
                            choice_response: None,
                            expectancy_response: None,
                            pain_response: None,
                            trial_number: None,
                        });
                    }
                }
                // Permute within the block only; block order is fixed.
                block.shuffle(rng);
                main.extend(block);
            }
        }
        for (i, trial) in main.iter_mut().enumerate() {
            trial.trial_number = Some(i as u32 + 1);
        }

        let calibration = (0..self.design.shock_levels)
            .map(|_| Trial {
                phase: Phase::Calibration,
                block: BlockNumber::Calibration,
                trial_type: "calibration",
                stimulus: Stimulus::None,
                context: Context::Calibration,
                choice1: None,
                choice2: None,
                is_choice_trial: false,
                reinforcement_probability: None,
                outcome: Some(Outcome::High),
                choice_response: None,
                expectancy_response: None,
                pain_response: None,
                trial_number: None,
            })
            .collect();

        tracing::debug!(
            target: "painrig::plan",
            main = main.len(),
            calibration = self.design.shock_levels,
            "trial plan generated"
        );
        TrialPlan { main, calibration }
    }
}

/// Settle a choice trial at the moment the participant's selection is
/// recorded. The optimal condition yields a fixed `medium` outcome; the
/// suboptimal one yields `high` with the block's reinforcement probability,
/// `low` otherwise.
pub fn resolve_choice<R: Rng + ?Sized>(
    trial: &mut Trial,
    chosen: TensCondition,
    cb: &Counterbalance,
    rng: &mut R,
) {
    assert!(trial.is_choice_trial, "resolve_choice on a non-choice trial");
    assert!(
        trial.outcome.is_none() && trial.choice_response.is_none(),
        "choice trial already resolved"
    );
    trial.stimulus = Stimulus::Tens;
    trial.choice_response = Some(chosen);
    trial.outcome = Some(if chosen == cb.optimal {
        Outcome::Medium
    } else {
        let probability = trial
            .reinforcement_probability
            .expect("choice trial carries a reinforcement probability");
        if rng.gen_bool(probability) {
            Outcome::High
        } else {
            Outcome::Low
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn counterbalance_mapping_matches_protocol() {
        let cb0 = Counterbalance::from_participant(100); // 100 % 4 == 0
        assert_eq!(cb0.index, 0);
        assert_eq!(cb0.group_name, "consistent");
        assert_eq!(cb0.suboptimal, TensCondition::Monopolar);
        assert_eq!(cb0.optimal, TensCondition::Bipolar);
        assert_eq!(cb0.pattern_kind(TensCondition::Monopolar), PatternKind::Pause);
        assert_eq!(cb0.pattern_kind(TensCondition::Bipolar), PatternKind::Constant);

        let cb1 = Counterbalance::from_participant(5); // 5 % 4 == 1
        assert_eq!(cb1.group_name, "change");
        assert_eq!(cb1.suboptimal, TensCondition::Bipolar);
        assert_eq!(cb1.optimal, TensCondition::Monopolar);

        let cb2 = Counterbalance::from_participant(2);
        assert_eq!(cb2.group_name, "consistent");
        // Upper counterbalance half flips which condition gets "pause".
        assert_eq!(cb2.pattern_kind(cb2.optimal), PatternKind::Pause);
        assert_eq!(cb2.pattern_kind(cb2.suboptimal), PatternKind::Constant);

        let cb3 = Counterbalance::from_participant(7);
        assert_eq!(cb3.group, 2);
        assert_eq!(cb3.pattern_kind(cb3.optimal), PatternKind::Pause);
    }

    #[test]
    fn change_group_schedule_thins_out() {
        let cb = Counterbalance::from_participant(1);
        assert_eq!(
            cb.conditioning_schedule(10),
            vec![1.0, 1.0, 0.75, 0.75, 0.5, 0.5, 0.25, 0.25, 0.0, 0.0]
        );
        let consistent = Counterbalance::from_participant(0);
        assert_eq!(consistent.conditioning_schedule(10), vec![1.0; 10]);
    }

    #[test]
    fn participant_id_parsing() {
        assert!(matches!(
            parse_participant_id(""),
            Err(RigError::InvalidParticipantId(_))
        ));
        assert!(matches!(
            parse_participant_id("abc"),
            Err(RigError::InvalidParticipantId(_))
        ));
        assert!(matches!(
            parse_participant_id("-3"),
            Err(RigError::InvalidParticipantId(_))
        ));
        assert_eq!(parse_participant_id(" 42 ").unwrap(), 42);
    }

    fn plan_for(pid: u32, seed: u64) -> (Counterbalance, TrialPlan) {
        let cb = Counterbalance::from_participant(pid);
        let design = SessionDesign::choice_variant(&cb);
        let mut rng = StdRng::seed_from_u64(seed);
        let plan = TrialPlanGenerator::new(&design).generate(&mut rng);
        (cb, plan)
    }

    #[test]
    fn per_block_counts_match_template_regardless_of_shuffle() {
        for seed in 0..5 {
            let (_, plan) = plan_for(3, seed);
            assert_eq!(plan.main.len(), 10 * 5 + 10 * 3);
            // First 10 blocks of 5: exactly 4 TENS + 1 control each.
            for block in plan.main[..50].chunks(5) {
                let tens = block.iter().filter(|t| t.trial_type == "TENS").count();
                let control = block.iter().filter(|t| t.trial_type == "control").count();
                assert_eq!((tens, control), (4, 1));
                assert!(block.iter().all(|t| t.phase == Phase::Conditioning));
            }
            // Then 10 blocks of 3: one of each condition.
            for block in plan.main[50..].chunks(3) {
                let mut types: Vec<_> = block.iter().map(|t| t.trial_type).collect();
                types.sort_unstable();
                assert_eq!(types, vec!["bipolar", "control", "monopolar"]);
                assert!(block.iter().all(|t| t.phase == Phase::Extinction));
            }
        }
    }

    #[test]
    fn block_boundaries_are_invariant_under_shuffle() {
        let (_, plan) = plan_for(3, 99);
        // Every trial in a 5-chunk carries the same block number.
        for (i, block) in plan.main[..50].chunks(5).enumerate() {
            let expected = BlockNumber::Num(i as u32 / 2 + 1);
            assert!(block.iter().all(|t| t.block == expected));
        }
        for (i, block) in plan.main[50..].chunks(3).enumerate() {
            let expected = BlockNumber::Num(i as u32);
            assert!(block.iter().all(|t| t.block == expected));
        }
    }

    #[test]
    fn trial_numbers_are_contiguous_from_one() {
        let (_, plan) = plan_for(0, 7);
        for (i, trial) in plan.main.iter().enumerate() {
            assert_eq!(trial.trial_number, Some(i as u32 + 1));
        }
        assert!(plan.calibration.iter().all(|t| t.trial_number.is_none()));
    }

    #[test]
    fn calibration_segment_is_separate_and_fixed() {
        let (_, plan) = plan_for(0, 7);
        assert_eq!(plan.calibration.len(), SHOCK_LEVELS as usize);
        for trial in &plan.calibration {
            assert_eq!(trial.phase, Phase::Calibration);
            assert_eq!(trial.block, BlockNumber::Calibration);
            assert_eq!(trial.outcome, Some(Outcome::High));
            assert!(trial.pain_response.is_none());
        }
    }

    #[test]
    fn choice_trials_start_unresolved() {
        let (_, plan) = plan_for(1, 1);
        for trial in plan.main.iter().filter(|t| t.is_choice_trial) {
            assert_eq!(trial.outcome, None);
            assert!(trial.choice1.is_some() && trial.choice2.is_some());
        }
    }

    #[test]
    fn optimal_choice_resolves_to_medium_deterministically() {
        let (cb, mut plan) = plan_for(1, 1);
        let mut rng = StdRng::seed_from_u64(0);
        let trial = plan
            .main
            .iter_mut()
            .find(|t| t.is_choice_trial)
            .expect("plan has choice trials");
        resolve_choice(trial, cb.optimal, &cb, &mut rng);
        assert_eq!(trial.outcome, Some(Outcome::Medium));
        assert_eq!(trial.choice_response, Some(cb.optimal));
        assert_eq!(trial.stimulus, Stimulus::Tens);
    }

    #[test]
    fn suboptimal_resolution_converges_to_schedule() {
        let cb = Counterbalance::from_participant(1);
        let mut rng = StdRng::seed_from_u64(42);
        let mut high = 0usize;
        let n = 10_000;
        for _ in 0..n {
            let mut trial = Trial {
                phase: Phase::Conditioning,
                block: BlockNumber::Num(1),
                trial_type: "TENS",
                stimulus: Stimulus::Tens,
                context: Context::A,
                choice1: Some(cb.optimal),
                choice2: Some(cb.suboptimal),
                is_choice_trial: true,
                reinforcement_probability: Some(0.75),
                outcome: None,
                choice_response: None,
                expectancy_response: None,
                pain_response: None,
                trial_number: Some(1),
            };
            resolve_choice(&mut trial, cb.suboptimal, &cb, &mut rng);
            match trial.outcome {
                Some(Outcome::High) => high += 1,
                Some(Outcome::Low) => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let fraction = high as f64 / n as f64;
        assert!(
            (fraction - 0.75).abs() < 0.02,
            "high fraction {fraction} should converge to 0.75"
        );
    }

    #[test]
    fn context_renewal_variant_adds_renewal_in_context_a() {
        let cb = Counterbalance::from_participant(2);
        let design = SessionDesign::context_renewal(&cb);
        assert!(design.uses_contexts);
        assert_eq!(design.phases.len(), 3);
        assert_eq!(design.phases[0].context, Context::A);
        assert_eq!(design.phases[1].context, Context::B);
        assert_eq!(design.phases[2].phase, Phase::Renewal);
        assert_eq!(design.phases[2].context, Context::A);

        let mut rng = StdRng::seed_from_u64(0);
        let plan = TrialPlanGenerator::new(&design).generate(&mut rng);
        let renewal: Vec<_> = plan
            .main
            .iter()
            .filter(|t| t.phase == Phase::Renewal)
            .collect();
        assert_eq!(renewal.len(), 2 * 3);
        assert!(renewal.iter().all(|t| t.context == Context::A));
    }
}
