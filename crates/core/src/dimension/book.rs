//! Dimension definitions, values and line assignments.
//!
//! Values form an arena keyed by id with parent links; every parent change
//! walks the proposed parent's ancestors with a visited set before anything
//! is written. Assignments are indexed by journal line.
//!
//! Assignment follows the same prepare/apply split as the journal: an
//! [`AssignmentPlan`] describes the complete new state of one
//! (line, dimension) pair and applying it cannot fail.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tally_shared::types::{AssignmentId, DimensionId, DimensionValueId, JournalEntryId};

use super::error::DimensionError;
use super::types::{
    AllocationRules, AmountSource, AssignInput, AssignMode, CreateDimensionInput,
    CreateDimensionValueInput, DimensionAssignment, DimensionDefinition, DimensionValue,
};
use crate::allocation::AllocationUtil;
use crate::ledger::{JournalLine, LegAllocation};

/// The complete new state of one (line, dimension) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    /// Line.
    pub journal_entry_id: JournalEntryId,
    /// Dimension.
    pub dimension_id: DimensionId,
    /// Assignments on the pair after the change.
    pub assignments: Vec<DimensionAssignment>,
    /// The assignment created by this change.
    pub created: AssignmentId,
}

/// Dimension state with its access paths.
#[derive(Debug, Clone, Default)]
pub struct DimensionBook {
    definitions: HashMap<DimensionId, DimensionDefinition>,
    by_code: HashMap<String, DimensionId>,
    values: HashMap<DimensionValueId, DimensionValue>,
    value_codes: HashMap<(DimensionId, String), DimensionValueId>,
    value_children: HashMap<DimensionValueId, Vec<DimensionValueId>>,
    assignments: HashMap<AssignmentId, DimensionAssignment>,
    by_entry: HashMap<JournalEntryId, Vec<AssignmentId>>,
}

impl DimensionBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from stored rows, checking value hierarchies for cycles.
    pub fn from_parts(
        definitions: impl IntoIterator<Item = DimensionDefinition>,
        values: impl IntoIterator<Item = DimensionValue>,
        assignments: impl IntoIterator<Item = DimensionAssignment>,
    ) -> Result<Self, DimensionError> {
        let mut book = Self::new();
        for definition in definitions {
            book.by_code.insert(definition.code.clone(), definition.id);
            book.definitions.insert(definition.id, definition);
        }
        for value in values {
            book.value_codes
                .insert((value.dimension_id, value.code.clone()), value.id);
            if let Some(parent) = value.parent_id {
                book.value_children.entry(parent).or_default().push(value.id);
            }
            book.values.insert(value.id, value);
        }
        for id in book.values.keys() {
            book.ancestors(*id)?;
        }
        let mut assignments: Vec<DimensionAssignment> = assignments.into_iter().collect();
        assignments.sort_by_key(|a| a.created_at);
        for assignment in assignments {
            book.insert_assignment(assignment);
        }
        Ok(book)
    }

    // ========== Definitions ==========

    /// Looks up a dimension.
    #[must_use]
    pub fn definition(&self, id: DimensionId) -> Option<&DimensionDefinition> {
        self.definitions.get(&id)
    }

    /// Looks up a dimension by code.
    #[must_use]
    pub fn definition_by_code(&self, code: &str) -> Option<&DimensionDefinition> {
        self.by_code.get(code).and_then(|id| self.definitions.get(id))
    }

    /// Every dimension, sorted by code.
    #[must_use]
    pub fn definitions(&self) -> Vec<&DimensionDefinition> {
        let mut all: Vec<&DimensionDefinition> = self.definitions.values().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    /// Creates a dimension.
    pub fn create_dimension(
        &mut self,
        input: CreateDimensionInput,
        now: DateTime<Utc>,
    ) -> Result<DimensionDefinition, DimensionError> {
        if input.code.trim().is_empty() {
            return Err(DimensionError::EmptyCode);
        }
        if self.by_code.contains_key(&input.code) {
            return Err(DimensionError::DuplicateDimensionCode(input.code));
        }
        if input.max_hierarchy_depth == 0 {
            return Err(DimensionError::InvalidDefinition(
                "max_hierarchy_depth must be at least 1".to_string(),
            ));
        }

        let definition = DimensionDefinition {
            id: DimensionId::new(),
            code: input.code,
            name: input.name,
            is_required: input.is_required,
            allows_multiple_values: input.allows_multiple_values,
            supports_hierarchy: input.supports_hierarchy,
            max_hierarchy_depth: if input.supports_hierarchy {
                input.max_hierarchy_depth
            } else {
                1
            },
            applies_to: input.applies_to,
            is_active: true,
            created_at: now,
        };
        self.by_code.insert(definition.code.clone(), definition.id);
        self.definitions.insert(definition.id, definition.clone());
        Ok(definition)
    }

    // ========== Values ==========

    /// Looks up a value.
    #[must_use]
    pub fn value(&self, id: DimensionValueId) -> Option<&DimensionValue> {
        self.values.get(&id)
    }

    /// Values of one dimension, sorted by path.
    #[must_use]
    pub fn values_of(&self, dimension_id: DimensionId) -> Vec<&DimensionValue> {
        let mut all: Vec<&DimensionValue> = self
            .values
            .values()
            .filter(|v| v.dimension_id == dimension_id)
            .collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        all
    }

    /// Every value.
    #[must_use]
    pub fn all_values(&self) -> Vec<&DimensionValue> {
        let mut all: Vec<&DimensionValue> = self.values.values().collect();
        all.sort_by(|a, b| a.dimension_id.cmp(&b.dimension_id).then_with(|| a.path.cmp(&b.path)));
        all
    }

    /// Creates a value, computing its level and path from the parent.
    pub fn create_value(&mut self, input: CreateDimensionValueInput) -> Result<DimensionValue, DimensionError> {
        let definition = self
            .definitions
            .get(&input.dimension_id)
            .ok_or(DimensionError::DimensionNotFound(input.dimension_id))?;
        if input.code.trim().is_empty() {
            return Err(DimensionError::EmptyCode);
        }
        if self
            .value_codes
            .contains_key(&(input.dimension_id, input.code.clone()))
        {
            return Err(DimensionError::DuplicateValueCode(input.code));
        }

        let (level, path) = match input.parent_id {
            None => (1, input.code.clone()),
            Some(parent_id) => {
                if !definition.supports_hierarchy {
                    return Err(DimensionError::HierarchyNotSupported(definition.id));
                }
                let parent = self.require_value(parent_id)?;
                if parent.dimension_id != input.dimension_id {
                    return Err(DimensionError::ValueDimensionMismatch {
                        value_id: parent_id,
                        dimension_id: input.dimension_id,
                    });
                }
                let level = parent.hierarchy_level + 1;
                if level > definition.max_hierarchy_depth {
                    return Err(DimensionError::MaxDepthExceeded {
                        max: definition.max_hierarchy_depth,
                        depth: level,
                    });
                }
                (level, format!("{}/{}", parent.path, input.code))
            }
        };

        let value = DimensionValue {
            id: DimensionValueId::new(),
            dimension_id: input.dimension_id,
            code: input.code,
            name: input.name,
            parent_id: input.parent_id,
            hierarchy_level: level,
            path,
            is_active: true,
        };
        self.value_codes
            .insert((value.dimension_id, value.code.clone()), value.id);
        if let Some(parent) = value.parent_id {
            self.value_children.entry(parent).or_default().push(value.id);
        }
        self.values.insert(value.id, value.clone());
        Ok(value)
    }

    /// Deactivates a value. Existing assignments are kept.
    pub fn deactivate_value(&mut self, id: DimensionValueId) -> Result<DimensionValue, DimensionError> {
        let value = self.values.get_mut(&id).ok_or(DimensionError::ValueNotFound(id))?;
        value.is_active = false;
        Ok(value.clone())
    }

    /// Parent chain of a value, nearest first.
    pub fn ancestors(&self, id: DimensionValueId) -> Result<Vec<DimensionValueId>, DimensionError> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = self.require_value(id)?.parent_id;
        while let Some(parent) = current {
            if !visited.insert(parent) {
                return Err(DimensionError::CycleDetected(parent));
            }
            chain.push(parent);
            current = self.require_value(parent)?.parent_id;
        }
        Ok(chain)
    }

    /// The value and all of its descendants.
    #[must_use]
    pub fn subtree(&self, id: DimensionValueId) -> Vec<DimensionValueId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(children) = self.value_children.get(&current) {
                stack.extend(children.iter().copied());
            }
        }
        out
    }

    /// Moves a value under a new parent (or to the root with `None`).
    ///
    /// Rejects the move if `value_id` is `new_parent` or one of its
    /// ancestors, or if the moved subtree would sit deeper than the
    /// dimension allows. Levels and paths of the whole subtree are
    /// recomputed.
    pub fn move_value(
        &mut self,
        value_id: DimensionValueId,
        new_parent: Option<DimensionValueId>,
    ) -> Result<DimensionValue, DimensionError> {
        let value = self.require_value(value_id)?;
        let definition = self
            .definitions
            .get(&value.dimension_id)
            .ok_or(DimensionError::DimensionNotFound(value.dimension_id))?;

        let new_level = match new_parent {
            None => 1,
            Some(parent_id) => {
                if !definition.supports_hierarchy {
                    return Err(DimensionError::HierarchyNotSupported(definition.id));
                }
                let parent = self.require_value(parent_id)?;
                if parent.dimension_id != value.dimension_id {
                    return Err(DimensionError::ValueDimensionMismatch {
                        value_id: parent_id,
                        dimension_id: value.dimension_id,
                    });
                }
                if parent_id == value_id || self.ancestors(parent_id)?.contains(&value_id) {
                    return Err(DimensionError::CircularReference { value_id, parent_id });
                }
                parent.hierarchy_level + 1
            }
        };

        let subtree_height = self
            .subtree(value_id)
            .iter()
            .filter_map(|id| self.values.get(id))
            .map(|v| v.hierarchy_level.saturating_sub(value.hierarchy_level))
            .max()
            .unwrap_or(0);
        let deepest = new_level + subtree_height;
        if deepest > definition.max_hierarchy_depth {
            return Err(DimensionError::MaxDepthExceeded {
                max: definition.max_hierarchy_depth,
                depth: deepest,
            });
        }

        let old_parent = value.parent_id;
        if let Some(old) = old_parent
            && let Some(children) = self.value_children.get_mut(&old)
        {
            children.retain(|c| *c != value_id);
        }
        if let Some(parent) = new_parent {
            self.value_children.entry(parent).or_default().push(value_id);
        }
        if let Some(v) = self.values.get_mut(&value_id) {
            v.parent_id = new_parent;
        }
        self.relabel(value_id);

        self.require_value(value_id).cloned()
    }

    /// Recomputes level and path for `root` and its descendants from the
    /// parent's current label.
    fn relabel(&mut self, root: DimensionValueId) {
        for id in self.subtree(root) {
            let Some(value) = self.values.get(&id) else {
                continue;
            };
            let (level, path) = match value.parent_id.and_then(|p| self.values.get(&p)) {
                Some(parent) => (parent.hierarchy_level + 1, format!("{}/{}", parent.path, value.code)),
                None => (1, value.code.clone()),
            };
            if let Some(value) = self.values.get_mut(&id) {
                value.hierarchy_level = level;
                value.path = path;
            }
        }
    }

    fn require_value(&self, id: DimensionValueId) -> Result<&DimensionValue, DimensionError> {
        self.values.get(&id).ok_or(DimensionError::ValueNotFound(id))
    }

    // ========== Assignments ==========

    /// Every assignment on a line.
    #[must_use]
    pub fn assignments_for(&self, entry_id: JournalEntryId) -> Vec<&DimensionAssignment> {
        self.by_entry
            .get(&entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.assignments.get(id)).collect())
            .unwrap_or_default()
    }

    /// Assignments on one (line, dimension) pair.
    #[must_use]
    pub fn assignments_for_pair(
        &self,
        entry_id: JournalEntryId,
        dimension_id: DimensionId,
    ) -> Vec<&DimensionAssignment> {
        self.assignments_for(entry_id)
            .into_iter()
            .filter(|a| a.dimension_id == dimension_id)
            .collect()
    }

    /// Every assignment.
    #[must_use]
    pub fn all_assignments(&self) -> Vec<&DimensionAssignment> {
        let mut all: Vec<&DimensionAssignment> = self.assignments.values().collect();
        all.sort_by_key(|a| a.created_at);
        all
    }

    /// Plans a single assignment against the line's current assignments.
    pub fn prepare_assign(
        &self,
        line: &JournalLine,
        input: &AssignInput,
        rules: AllocationRules,
        now: DateTime<Utc>,
    ) -> Result<AssignmentPlan, DimensionError> {
        let existing: Vec<DimensionAssignment> = self
            .assignments_for_pair(line.id, input.dimension_id)
            .into_iter()
            .cloned()
            .collect();
        self.plan(line, existing, input, rules, now)
    }

    /// Plans the allocations carried by a leg at posting time.
    ///
    /// Allocations are applied in order, so a later allocation sees the
    /// earlier ones on the same pair.
    pub fn prepare_leg_allocations(
        &self,
        line: &JournalLine,
        allocations: &[LegAllocation],
        rules: AllocationRules,
        now: DateTime<Utc>,
    ) -> Result<Vec<AssignmentPlan>, DimensionError> {
        let mut pairs: Vec<AssignmentPlan> = Vec::new();
        for allocation in allocations {
            let input = AssignInput::new(line.id, allocation.dimension_id, allocation.value_id, allocation.percentage);
            let position = pairs.iter().position(|p| p.dimension_id == allocation.dimension_id);
            let existing = position.map(|i| pairs[i].assignments.clone()).unwrap_or_default();
            let plan = self.plan(line, existing, &input, rules, now)?;
            match position {
                Some(i) => pairs[i] = plan,
                None => pairs.push(plan),
            }
        }
        Ok(pairs)
    }

    /// Copies every assignment of `original` onto `reversing`, keeping
    /// percentages and amounts.
    #[must_use]
    pub fn mirror_assignments(
        &self,
        original: JournalEntryId,
        reversing: JournalEntryId,
        now: DateTime<Utc>,
    ) -> Vec<DimensionAssignment> {
        self.assignments_for(original)
            .into_iter()
            .map(|a| DimensionAssignment {
                id: AssignmentId::new(),
                journal_entry_id: reversing,
                created_at: now,
                ..a.clone()
            })
            .collect()
    }

    /// Replaces the pair's assignments with the planned state and returns
    /// the created assignment.
    pub fn apply(&mut self, plan: AssignmentPlan) -> Option<DimensionAssignment> {
        let stale: Vec<AssignmentId> = self
            .assignments_for_pair(plan.journal_entry_id, plan.dimension_id)
            .into_iter()
            .map(|a| a.id)
            .collect();
        for id in &stale {
            self.assignments.remove(id);
        }
        if let Some(ids) = self.by_entry.get_mut(&plan.journal_entry_id) {
            ids.retain(|id| !stale.contains(id));
        }

        let created = plan.created;
        let mut result = None;
        for assignment in plan.assignments {
            if assignment.id == created {
                result = Some(assignment.clone());
            }
            self.insert_assignment(assignment);
        }
        result
    }

    /// Inserts assignments without planning (reversal mirrors, restore).
    pub fn insert_assignments(&mut self, assignments: impl IntoIterator<Item = DimensionAssignment>) {
        for assignment in assignments {
            self.insert_assignment(assignment);
        }
    }

    fn insert_assignment(&mut self, assignment: DimensionAssignment) {
        self.by_entry
            .entry(assignment.journal_entry_id)
            .or_default()
            .push(assignment.id);
        self.assignments.insert(assignment.id, assignment);
    }

    fn plan(
        &self,
        line: &JournalLine,
        mut pair: Vec<DimensionAssignment>,
        input: &AssignInput,
        rules: AllocationRules,
        now: DateTime<Utc>,
    ) -> Result<AssignmentPlan, DimensionError> {
        let definition = self
            .definitions
            .get(&input.dimension_id)
            .ok_or(DimensionError::DimensionNotFound(input.dimension_id))?;
        if !definition.is_active {
            return Err(DimensionError::DimensionInactive(definition.id));
        }
        let value = self.require_value(input.value_id)?;
        if value.dimension_id != input.dimension_id {
            return Err(DimensionError::ValueDimensionMismatch {
                value_id: input.value_id,
                dimension_id: input.dimension_id,
            });
        }
        if !value.is_active {
            return Err(DimensionError::ValueInactive(value.id));
        }
        if input.percentage < Decimal::ZERO || input.percentage > Decimal::ONE_HUNDRED {
            return Err(DimensionError::InvalidPercentage(input.percentage));
        }

        let line_amount = line.amount();
        if let Some(amount) = input.amount
            && (amount < Decimal::ZERO || amount > line_amount)
        {
            return Err(DimensionError::InvalidAmount { amount, line_amount });
        }

        let duplicate = DimensionError::DuplicateAssignment {
            journal_entry_id: line.id,
            dimension_id: input.dimension_id,
        };
        if definition.allows_multiple_values {
            if let Some(idx) = pair.iter().position(|a| a.value_id == input.value_id) {
                match input.mode {
                    AssignMode::Insert => return Err(duplicate),
                    AssignMode::Replace => {
                        pair.remove(idx);
                    }
                }
            }
        } else if !pair.is_empty() {
            match input.mode {
                AssignMode::Insert => return Err(duplicate),
                AssignMode::Replace => pair.clear(),
            }
        }

        let total: Decimal = pair.iter().map(|a| a.allocation_percentage).sum::<Decimal>() + input.percentage;
        if total > Decimal::ONE_HUNDRED {
            return Err(DimensionError::PercentageOverflow {
                dimension_id: input.dimension_id,
                total,
            });
        }

        let (allocation_amount, amount_source) = match input.amount {
            Some(amount) => (amount, AmountSource::Explicit),
            None => (
                AllocationUtil::amount_for_percentage(line_amount, input.percentage, rules.scale, rules.rounding),
                AmountSource::Derived,
            ),
        };
        let created = AssignmentId::new();
        pair.push(DimensionAssignment {
            id: created,
            journal_entry_id: line.id,
            dimension_id: input.dimension_id,
            value_id: input.value_id,
            allocation_percentage: input.percentage,
            allocation_amount,
            amount_source,
            created_at: now,
        });

        Self::rebalance(&mut pair, line_amount, total, rules);

        Ok(AssignmentPlan {
            journal_entry_id: line.id,
            dimension_id: input.dimension_id,
            assignments: pair,
            created,
        })
    }

    /// At exactly 100% with only derived amounts, re-split the line amount
    /// so the pair sums to it exactly.
    fn rebalance(pair: &mut [DimensionAssignment], line_amount: Decimal, total: Decimal, rules: AllocationRules) {
        if total != Decimal::ONE_HUNDRED || pair.iter().any(|a| a.amount_source == AmountSource::Explicit) {
            return;
        }
        let percentages: Vec<Decimal> = pair.iter().map(|a| a.allocation_percentage).collect();
        let shares = AllocationUtil::allocate_by_percentages(line_amount, &percentages, rules.scale, rules.rounding);
        for (assignment, share) in pair.iter_mut().zip(shares) {
            assignment.allocation_amount = share;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Origin;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tally_shared::types::{AccountId, TransactionId};

    fn line(amount: Decimal) -> JournalLine {
        JournalLine {
            id: JournalEntryId::new(),
            transaction_id: TransactionId::new(),
            account_id: AccountId::new(),
            date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            debit: amount,
            credit: Decimal::ZERO,
            description: None,
            origin: Origin::Purchases,
            branch_id: None,
            reversal_of: None,
            reversed: false,
            sequence: 0,
        }
    }

    struct Fixture {
        book: DimensionBook,
        cost_center: DimensionId,
        a: DimensionValueId,
        b: DimensionValueId,
        c: DimensionValueId,
    }

    fn fixture(multi: bool) -> Fixture {
        let mut book = DimensionBook::new();
        let mut input = CreateDimensionInput::new("CC", "Cost center");
        if multi {
            input = input.multi_value();
        }
        let dim = book.create_dimension(input, Utc::now()).unwrap();
        let a = book.create_value(CreateDimensionValueInput::new(dim.id, "A", "A")).unwrap();
        let b = book.create_value(CreateDimensionValueInput::new(dim.id, "B", "B")).unwrap();
        let c = book.create_value(CreateDimensionValueInput::new(dim.id, "C", "C")).unwrap();
        Fixture {
            book,
            cost_center: dim.id,
            a: a.id,
            b: b.id,
            c: c.id,
        }
    }

    fn assign(f: &mut Fixture, line: &JournalLine, input: &AssignInput) -> Result<DimensionAssignment, DimensionError> {
        let plan = f.book.prepare_assign(line, input, AllocationRules::default(), Utc::now())?;
        Ok(f.book.apply(plan).unwrap())
    }

    #[test]
    fn test_sixty_forty_split_derives_amounts() {
        let mut f = fixture(true);
        let l = line(dec!(900));
        let (dim, a, b) = (f.cost_center, f.a, f.b);
        assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(60))).unwrap();
        assign(&mut f, &l, &AssignInput::new(l.id, dim, b, dec!(40))).unwrap();

        let amounts: Vec<Decimal> = f.book.assignments_for(l.id).iter().map(|x| x.allocation_amount).collect();
        assert_eq!(amounts, vec![dec!(540), dec!(360)]);
    }

    #[test]
    fn test_thirds_rebalance_to_line_amount() {
        let mut f = fixture(true);
        let l = line(dec!(100));
        let (dim, a, b, c) = (f.cost_center, f.a, f.b, f.c);
        let rules = AllocationRules {
            scale: 2,
            ..AllocationRules::default()
        };
        for (value, pct) in [(a, dec!(33.33)), (b, dec!(33.33)), (c, dec!(33.34))] {
            let plan = f
                .book
                .prepare_assign(&l, &AssignInput::new(l.id, dim, value, pct), rules, Utc::now())
                .unwrap();
            f.book.apply(plan);
        }
        let sum: Decimal = f.book.assignments_for(l.id).iter().map(|x| x.allocation_amount).sum();
        assert_eq!(sum, dec!(100));
    }

    #[test]
    fn test_single_value_dimension_rejects_second_insert() {
        let mut f = fixture(false);
        let l = line(dec!(100));
        let (dim, a, b) = (f.cost_center, f.a, f.b);
        assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(100))).unwrap();
        let err = assign(&mut f, &l, &AssignInput::new(l.id, dim, b, dec!(100))).unwrap_err();
        assert!(matches!(err, DimensionError::DuplicateAssignment { .. }));

        let replaced = assign(&mut f, &l, &AssignInput::new(l.id, dim, b, dec!(100)).replacing()).unwrap();
        assert_eq!(replaced.value_id, b);
        assert_eq!(f.book.assignments_for(l.id).len(), 1);
    }

    #[test]
    fn test_multi_value_overflow_rejected() {
        let mut f = fixture(true);
        let l = line(dec!(100));
        let (dim, a, b) = (f.cost_center, f.a, f.b);
        assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(70))).unwrap();
        let err = assign(&mut f, &l, &AssignInput::new(l.id, dim, b, dec!(40))).unwrap_err();
        assert_eq!(
            err,
            DimensionError::PercentageOverflow {
                dimension_id: dim,
                total: dec!(110),
            }
        );
        // Replacing A with a smaller share makes room.
        assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(60)).replacing()).unwrap();
        assign(&mut f, &l, &AssignInput::new(l.id, dim, b, dec!(40))).unwrap();
        assert_eq!(f.book.assignments_for(l.id).len(), 2);
    }

    #[test]
    fn test_invalid_percentage_and_foreign_value() {
        let mut f = fixture(true);
        let other = f
            .book
            .create_dimension(CreateDimensionInput::new("PRJ", "Project"), Utc::now())
            .unwrap();
        let l = line(dec!(100));
        let (dim, a) = (f.cost_center, f.a);
        assert_eq!(
            assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(101))).unwrap_err(),
            DimensionError::InvalidPercentage(dec!(101))
        );
        assert!(matches!(
            assign(&mut f, &l, &AssignInput::new(l.id, other.id, a, dec!(50))).unwrap_err(),
            DimensionError::ValueDimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_explicit_amount_bounded_by_line() {
        let mut f = fixture(true);
        let l = line(dec!(100));
        let (dim, a) = (f.cost_center, f.a);
        let err = assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(50)).with_amount(dec!(150))).unwrap_err();
        assert!(matches!(err, DimensionError::InvalidAmount { .. }));
        let ok = assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(50)).with_amount(dec!(45))).unwrap();
        assert_eq!(ok.allocation_amount, dec!(45));
        assert_eq!(ok.amount_source, AmountSource::Explicit);
    }

    #[test]
    fn test_leg_allocations_see_each_other() {
        let f = fixture(true);
        let l = line(dec!(900));
        let allocations = [
            LegAllocation {
                dimension_id: f.cost_center,
                value_id: f.a,
                percentage: dec!(60),
            },
            LegAllocation {
                dimension_id: f.cost_center,
                value_id: f.a,
                percentage: dec!(40),
            },
        ];
        let err = f
            .book
            .prepare_leg_allocations(&l, &allocations, AllocationRules::default(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DimensionError::DuplicateAssignment { .. }));
    }

    #[test]
    fn test_hierarchy_levels_and_paths() {
        let mut book = DimensionBook::new();
        let dim = book
            .create_dimension(CreateDimensionInput::new("BR", "Branch").hierarchical(3), Utc::now())
            .unwrap();
        let north = book.create_value(CreateDimensionValueInput::new(dim.id, "N", "North")).unwrap();
        let city = book
            .create_value(CreateDimensionValueInput::new(dim.id, "N1", "North city").under(north.id))
            .unwrap();
        let shop = book
            .create_value(CreateDimensionValueInput::new(dim.id, "N1A", "Shop").under(city.id))
            .unwrap();
        assert_eq!(shop.hierarchy_level, 3);
        assert_eq!(shop.path, "N/N1/N1A");

        let err = book
            .create_value(CreateDimensionValueInput::new(dim.id, "X", "Too deep").under(shop.id))
            .unwrap_err();
        assert_eq!(err, DimensionError::MaxDepthExceeded { max: 3, depth: 4 });
    }

    #[test]
    fn test_move_value_rejects_cycles() {
        let mut book = DimensionBook::new();
        let dim = book
            .create_dimension(CreateDimensionInput::new("BR", "Branch").hierarchical(5), Utc::now())
            .unwrap();
        let a = book.create_value(CreateDimensionValueInput::new(dim.id, "A", "A")).unwrap();
        let b = book
            .create_value(CreateDimensionValueInput::new(dim.id, "B", "B").under(a.id))
            .unwrap();
        let c = book
            .create_value(CreateDimensionValueInput::new(dim.id, "C", "C").under(b.id))
            .unwrap();

        assert_eq!(
            book.move_value(a.id, Some(c.id)).unwrap_err(),
            DimensionError::CircularReference {
                value_id: a.id,
                parent_id: c.id,
            }
        );
        assert!(matches!(
            book.move_value(a.id, Some(a.id)).unwrap_err(),
            DimensionError::CircularReference { .. }
        ));

        // Detach B: the subtree is relabelled.
        let moved = book.move_value(b.id, None).unwrap();
        assert_eq!(moved.hierarchy_level, 1);
        assert_eq!(book.value(c.id).unwrap().path, "B/C");
        assert_eq!(book.value(c.id).unwrap().hierarchy_level, 2);
        assert_eq!(book.subtree(a.id), vec![a.id]);
    }

    #[test]
    fn test_move_value_respects_depth() {
        let mut book = DimensionBook::new();
        let dim = book
            .create_dimension(CreateDimensionInput::new("BR", "Branch").hierarchical(2), Utc::now())
            .unwrap();
        let a = book.create_value(CreateDimensionValueInput::new(dim.id, "A", "A")).unwrap();
        let b = book.create_value(CreateDimensionValueInput::new(dim.id, "B", "B")).unwrap();
        book.create_value(CreateDimensionValueInput::new(dim.id, "B1", "B1").under(b.id))
            .unwrap();
        assert_eq!(
            book.move_value(b.id, Some(a.id)).unwrap_err(),
            DimensionError::MaxDepthExceeded { max: 2, depth: 3 }
        );
    }

    #[test]
    fn test_flat_dimension_rejects_parent() {
        let mut f = fixture(false);
        let (dim, a) = (f.cost_center, f.a);
        let err = f
            .book
            .create_value(CreateDimensionValueInput::new(dim, "A1", "Child").under(a))
            .unwrap_err();
        assert_eq!(err, DimensionError::HierarchyNotSupported(dim));
    }

    #[test]
    fn test_mirror_keeps_percentages_and_amounts() {
        let mut f = fixture(true);
        let l = line(dec!(900));
        let (dim, a) = (f.cost_center, f.a);
        assign(&mut f, &l, &AssignInput::new(l.id, dim, a, dec!(60))).unwrap();
        let reversing = JournalEntryId::new();
        let mirrored = f.book.mirror_assignments(l.id, reversing, Utc::now());
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].journal_entry_id, reversing);
        assert_eq!(mirrored[0].allocation_amount, dec!(540));
        assert_eq!(mirrored[0].allocation_percentage, dec!(60));
    }
}
