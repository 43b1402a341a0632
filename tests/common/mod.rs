use std::io::Error;
use std::io::Write;
use std::path::Path;

pub const BATCH_HEADER: &str = "batch_id,line_id,sender_name,sender_account,sender_kyc_ref,beneficiary_name,beneficiary_account,beneficiary_bank_code,amount,currency,purpose,schedule_time";

/// One well-formed batch row with the given line id, beneficiary and amount.
pub fn batch_row(line_id: &str, beneficiary: &str, amount: &str, kyc_ref: &str) -> String {
    format!(
        "B-1,{line_id},Acme Ltd,SND-1,{kyc_ref},{beneficiary},BEN-1,HDFC0001234,{amount},INR,invoice,2026-08-27T10:00:00Z"
    )
}

pub fn write_batch_csv(path: &Path, rows: &[String]) -> Result<(), Error> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "{BATCH_HEADER}")?;
    for row in rows {
        writeln!(file, "{row}")?;
    }
    Ok(())
}
