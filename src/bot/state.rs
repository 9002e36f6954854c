use serde::Deserialize;
use serde::Serialize;

use crate::bot::callback::CheckoutField;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum ConversationState {
  #[default]
  Idle,
  Checkout(CheckoutDraft),
  /// Waiting for the user to type an FAQ search query; `page` is the FAQ
  /// list page to return to on cancel.
  AwaitingFaqQuery { page: u64 },
  /// Waiting for the admin to upload a product file.
  AwaitingImport { admin_tg_id: i64 },
  /// Waiting for a product id whose soft-delete flag gets flipped.
  TogglingProduct { admin_tg_id: i64 },
  /// Same, for an FAQ entry.
  TogglingFaq { admin_tg_id: i64 },
}

/// Everything collected during checkout so far. Going back never clears a
/// field; re-answering a prompt overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutDraft {
  pub stage: CheckoutStage,
  /// Set while re-answering a single prompt from the confirmation screen;
  /// the next answer returns there instead of continuing the linear flow.
  pub editing: bool,
  /// The last prompt sent by the bot, deleted when the user answers.
  pub prompt_message_id: Option<i32>,
  pub address: Option<String>,
  pub phone: Option<String>,
  pub wishes: Option<String>,
  pub delivery_time: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckoutStage {
  Address,
  Phone,
  Wishes,
  DeliveryTime,
  Confirmation,
  EditChoice,
}

impl CheckoutDraft {
  pub fn new() -> Self {
    Self {
      stage: CheckoutStage::Address,
      editing: false,
      prompt_message_id: None,
      address: None,
      phone: None,
      wishes: None,
      delivery_time: None,
    }
  }

  /// The stage a Back press from the current one lands on; `None` means
  /// leaving checkout back to the cart.
  pub fn previous_stage(&self) -> Option<CheckoutStage> {
    match self.stage {
      CheckoutStage::Address => None,
      CheckoutStage::Phone => Some(CheckoutStage::Address),
      CheckoutStage::Wishes => Some(CheckoutStage::Phone),
      CheckoutStage::DeliveryTime => Some(CheckoutStage::Wishes),
      CheckoutStage::Confirmation => Some(CheckoutStage::DeliveryTime),
      CheckoutStage::EditChoice => Some(CheckoutStage::Confirmation),
    }
  }

  pub fn next_stage(&self) -> Option<CheckoutStage> {
    match self.stage {
      CheckoutStage::Address => Some(CheckoutStage::Phone),
      CheckoutStage::Phone => Some(CheckoutStage::Wishes),
      CheckoutStage::Wishes => Some(CheckoutStage::DeliveryTime),
      CheckoutStage::DeliveryTime => Some(CheckoutStage::Confirmation),
      CheckoutStage::Confirmation | CheckoutStage::EditChoice => None,
    }
  }

  pub fn stage_for_field(field: CheckoutField) -> CheckoutStage {
    match field {
      CheckoutField::Address => CheckoutStage::Address,
      CheckoutField::Phone => CheckoutStage::Phone,
      CheckoutField::Wishes => CheckoutStage::Wishes,
      CheckoutField::DeliveryTime => CheckoutStage::DeliveryTime,
    }
  }

  /// Picks the stage after the current prompt was answered (or skipped):
  /// back to confirmation when the prompt was opened through the edit
  /// flow, the next prompt of the linear flow otherwise.
  pub fn advance_after_answer(&mut self) {
    if self.editing {
      self.editing = false;
      self.stage = CheckoutStage::Confirmation;
    } else {
      self.stage = self.next_stage().unwrap_or(CheckoutStage::Confirmation);
    }
  }

  /// Re-opens a single prompt from the confirmation screen.
  pub fn begin_edit(&mut self, field: CheckoutField) {
    self.editing = true;
    self.stage = Self::stage_for_field(field);
  }
}

#[cfg(test)]
mod tests {
  use super::CheckoutDraft;
  use super::CheckoutStage;
  use crate::bot::callback::CheckoutField;

  #[test]
  fn new_draft_starts_with_address_stage() {
    let draft = CheckoutDraft::new();
    assert_eq!(draft.stage, CheckoutStage::Address);
    assert!(draft.address.is_none());
    assert!(draft.prompt_message_id.is_none());
  }

  #[test]
  fn forward_sequence_covers_every_prompt() {
    let mut draft = CheckoutDraft::new();
    let mut visited = vec![draft.stage];
    while let Some(next) = draft.next_stage() {
      draft.stage = next;
      visited.push(next);
    }
    assert_eq!(
      visited,
      vec![
        CheckoutStage::Address,
        CheckoutStage::Phone,
        CheckoutStage::Wishes,
        CheckoutStage::DeliveryTime,
        CheckoutStage::Confirmation,
      ]
    );
  }

  #[test]
  fn back_returns_to_the_previous_prompt_and_keeps_fields() {
    let mut draft = CheckoutDraft::new();
    draft.address = Some("Невский 1".to_string());
    draft.phone = Some("+79991234567".to_string());
    draft.stage = CheckoutStage::Wishes;

    draft.stage = draft.previous_stage().expect("phone comes before wishes");
    assert_eq!(draft.stage, CheckoutStage::Phone);
    assert_eq!(draft.address.as_deref(), Some("Невский 1"));
    assert_eq!(draft.phone.as_deref(), Some("+79991234567"));
  }

  #[test]
  fn back_from_the_first_prompt_leaves_checkout() {
    let draft = CheckoutDraft::new();
    assert_eq!(draft.previous_stage(), None);
  }

  #[test]
  fn edit_choice_backs_into_confirmation() {
    let mut draft = CheckoutDraft::new();
    draft.stage = CheckoutStage::EditChoice;
    assert_eq!(draft.previous_stage(), Some(CheckoutStage::Confirmation));
  }

  #[test]
  fn field_edits_map_to_their_stage() {
    assert_eq!(CheckoutDraft::stage_for_field(CheckoutField::Phone), CheckoutStage::Phone);
    assert_eq!(
      CheckoutDraft::stage_for_field(CheckoutField::DeliveryTime),
      CheckoutStage::DeliveryTime
    );
  }

  #[test]
  fn edited_answer_returns_to_confirmation() {
    let mut draft = CheckoutDraft::new();
    draft.address = Some("a".to_string());
    draft.phone = Some("p".to_string());
    draft.begin_edit(CheckoutField::Address);
    assert_eq!(draft.stage, CheckoutStage::Address);

    draft.advance_after_answer();
    assert_eq!(draft.stage, CheckoutStage::Confirmation);
    assert!(!draft.editing);
  }

  #[test]
  fn re_answering_after_back_resumes_the_linear_flow() {
    let mut draft = CheckoutDraft::new();
    draft.address = Some("a".to_string());
    draft.phone = Some("p".to_string());
    draft.wishes = Some("w".to_string());
    draft.stage = CheckoutStage::DeliveryTime;

    draft.stage = draft.previous_stage().expect("wishes comes before delivery time");
    assert_eq!(draft.stage, CheckoutStage::Wishes);

    draft.advance_after_answer();
    assert_eq!(draft.stage, CheckoutStage::DeliveryTime);
  }
}
