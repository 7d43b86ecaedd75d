//! The fixed extraction prompt.
//!
//! The prompt is sent unmodified with every request. It defines both the
//! output shape (the four keys of [`crate::ExtractionResult`]) and the
//! extraction rules, so any change here is a change to the response contract
//! that [`crate::pipeline::response`] parses against.

/// Instruction text placed first in the user turn, before the page images.
pub const EXTRACTION_PROMPT: &str = r#"
You are an OCR agent, your task is to extract text information from images with accuracy and attention to detail. When encountering amounts of money, be careful to correctly identify the currency symbols and not to confuse commas with numbers. In cases where there are multiple totals, prioritize dollar amounts.

From the provided image, extract the information and return a JSON object with the following keys:

1. receiver_name: Name of the Buyer
2. supplier_name: Name of the Seller
3. invoice_total: Total amount of the Invoice, represented as a floating-point number
4. invoice_date: Date of the transaction, formatted as YYYY/MM/DD

Do not use markdown symbols like "```" or "```json" at the beginning or end of your response.
"#;
