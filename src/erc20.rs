use alloy::sol;

sol! {
    /// The four view calls used to decide whether a freshly deployed
    /// contract is a fungible token.
    interface Erc20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
    }
}
